//! Capability tiers ("ES5", "ES2015", ...) and the linkage formats bundles are emitted in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A language-capability tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScriptTarget {
    Es3,
    Es5,
    Es2015,
    Es2016,
    Es2017,
    Es2018,
    Es2019,
    Es2020,
    Es2021,
    Es2022,
    EsNext,
}

/// Module-linkage format of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    #[serde(alias = "var")]
    Iife,
    #[serde(alias = "commonjs", alias = "commonjs2")]
    Cjs,
    Amd,
    Umd,
    #[serde(alias = "es", alias = "module", alias = "es2015")]
    Esm,
}

impl ScriptTarget {
    /// Numeric capability rank; higher means more language features.
    pub fn rank(self) -> u32 {
        match self {
            Self::Es3 => 3,
            Self::Es5 => 5,
            Self::Es2015 => 2015,
            Self::Es2016 => 2016,
            Self::Es2017 => 2017,
            Self::Es2018 => 2018,
            Self::Es2019 => 2019,
            Self::Es2020 => 2020,
            Self::Es2021 => 2021,
            Self::Es2022 => 2022,
            Self::EsNext => 9999,
        }
    }

    /// Suffix used in output directory names and manifest keys (`fesm5`, `esm2015`).
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Es3 => "3",
            Self::Es5 => "5",
            Self::Es2015 => "2015",
            Self::Es2016 => "2016",
            Self::Es2017 => "2017",
            Self::Es2018 => "2018",
            Self::Es2019 => "2019",
            Self::Es2020 => "2020",
            Self::Es2021 => "2021",
            Self::Es2022 => "2022",
            Self::EsNext => "next",
        }
    }

    /// Value passed to the compiler's `--target` flag.
    pub fn compiler_flag(self) -> &'static str {
        match self {
            Self::Es3 => "es3",
            Self::Es5 => "es5",
            Self::Es2015 => "es2015",
            Self::Es2016 => "es2016",
            Self::Es2017 => "es2017",
            Self::Es2018 => "es2018",
            Self::Es2019 => "es2019",
            Self::Es2020 => "es2020",
            Self::Es2021 => "es2021",
            Self::Es2022 => "es2022",
            Self::EsNext => "esnext",
        }
    }

    /// True for ES5 and below, the tier UMD bundles get minified at by default.
    pub fn is_legacy(self) -> bool {
        self.rank() <= Self::Es5.rank()
    }

    /// Ordered package.json fields a resolver should prefer when consuming at this tier.
    pub fn main_fields(self) -> &'static [&'static str] {
        if self.rank() >= Self::Es2015.rank() {
            &["es2015", "browser", "module", "main"]
        } else {
            &["browser", "module", "main"]
        }
    }
}

impl FromStr for ScriptTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let target = match normalized.as_str() {
            "es3" => Self::Es3,
            "es5" => Self::Es5,
            "es6" | "es2015" => Self::Es2015,
            "es7" | "es2016" => Self::Es2016,
            "es2017" => Self::Es2017,
            "es2018" => Self::Es2018,
            "es2019" => Self::Es2019,
            "es2020" => Self::Es2020,
            "es2021" => Self::Es2021,
            "es2022" => Self::Es2022,
            "esnext" | "latest" => Self::EsNext,
            _ => return Err(format!("unknown script target '{}'", s)),
        };
        Ok(target)
    }
}

impl fmt::Display for ScriptTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EsNext => f.write_str("ESNext"),
            other => write!(f, "ES{}", other.suffix()),
        }
    }
}

impl Serialize for ScriptTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.compiler_flag())
    }
}

impl<'de> Deserialize<'de> for ScriptTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl ModuleFormat {
    /// Name in the graph bundler's `--format` vocabulary.
    pub fn graph_bundler_name(self) -> &'static str {
        match self {
            Self::Iife => "iife",
            Self::Cjs => "cjs",
            Self::Amd => "amd",
            Self::Umd => "umd",
            Self::Esm => "es",
        }
    }

    /// Name in the plugin bundler's `output.library.type` vocabulary.
    pub fn plugin_bundler_name(self) -> &'static str {
        match self {
            Self::Iife => "var",
            Self::Cjs => "commonjs2",
            Self::Amd => "amd",
            Self::Umd => "umd",
            Self::Esm => "module",
        }
    }

    /// `--module` value for a single-file compiler transform.
    pub fn compiler_module(self) -> &'static str {
        match self {
            Self::Iife => "none",
            Self::Cjs => "commonjs",
            Self::Amd => "amd",
            Self::Umd => "umd",
            Self::Esm => "es2015",
        }
    }

    /// Formats that expose their exports through a global variable in browsers.
    pub fn needs_globals(self) -> bool {
        matches!(self, Self::Iife | Self::Umd | Self::Amd)
    }

    pub fn is_esm(self) -> bool {
        matches!(self, Self::Esm)
    }
}

impl fmt::Display for ModuleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Iife => "iife",
            Self::Cjs => "cjs",
            Self::Amd => "amd",
            Self::Umd => "umd",
            Self::Esm => "esm",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tiers() {
        assert_eq!("ES2015".parse::<ScriptTarget>().unwrap(), ScriptTarget::Es2015);
        assert_eq!("es6".parse::<ScriptTarget>().unwrap(), ScriptTarget::Es2015);
        assert_eq!(" es5 ".parse::<ScriptTarget>().unwrap(), ScriptTarget::Es5);
        assert!("es1999".parse::<ScriptTarget>().is_err());
    }

    #[test]
    fn test_rank_ordering() {
        assert!(ScriptTarget::Es5.rank() < ScriptTarget::Es2015.rank());
        assert!(ScriptTarget::Es2022.rank() < ScriptTarget::EsNext.rank());
        assert!(ScriptTarget::Es5.is_legacy());
        assert!(!ScriptTarget::Es2015.is_legacy());
    }

    #[test]
    fn test_main_fields() {
        assert_eq!(ScriptTarget::Es2015.main_fields()[0], "es2015");
        assert_eq!(ScriptTarget::Es5.main_fields(), &["browser", "module", "main"]);
    }

    #[test]
    fn test_format_aliases() {
        let format: ModuleFormat = serde_json::from_str("\"commonjs\"").unwrap();
        assert_eq!(format, ModuleFormat::Cjs);
        let format: ModuleFormat = serde_json::from_str("\"var\"").unwrap();
        assert_eq!(format, ModuleFormat::Iife);
        assert_eq!(ModuleFormat::Esm.graph_bundler_name(), "es");
    }

    #[test]
    fn test_display() {
        assert_eq!(ScriptTarget::Es5.to_string(), "ES5");
        assert_eq!(ScriptTarget::Es2015.to_string(), "ES2015");
    }
}
