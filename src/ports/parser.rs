// SPDX-License-Identifier: MIT OR Apache-2.0

//! File format parser trait definition.

use crate::domain::Result;
use std::collections::HashMap;
use std::path::Path;

/// Turns the text of a configuration file into flat, dot-separated properties.
///
/// Nested structures are flattened, so
///
/// ```yaml
/// database:
///   pool:
///     size: 10
/// ```
///
/// becomes `database.pool.size -> "10"`. Parsers must never emit an empty key.
pub trait ConfigParser: Send + Sync {
    /// Parses file content into a flat property map.
    fn parse(&self, content: &str) -> Result<HashMap<String, String>>;

    /// File extensions (without the leading dot) handled by this parser.
    fn supported_extensions(&self) -> &[&str];

    /// Returns `true` if the file extension of `path` is handled by this parser.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dynacfg::ports::ConfigParser;
    /// use dynacfg::domain::Result;
    /// use std::collections::HashMap;
    /// use std::path::Path;
    ///
    /// struct Ini;
    ///
    /// impl ConfigParser for Ini {
    ///     fn parse(&self, _content: &str) -> Result<HashMap<String, String>> {
    ///         Ok(HashMap::new())
    ///     }
    ///
    ///     fn supported_extensions(&self) -> &[&str] {
    ///         &["ini"]
    ///     }
    /// }
    ///
    /// assert!(Ini.supports(Path::new("/etc/app/settings.INI")));
    /// assert!(!Ini.supports(Path::new("/etc/app/settings.yaml")));
    /// ```
    fn supports(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.supported_extensions()
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}
