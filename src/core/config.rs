//! Immutable run configuration.
//!
//! The command line is parsed exactly once into a [`PostLinkConfig`], which is
//! then handed by reference to every stage of the pipeline.

use std::path::{Path, PathBuf};

use clap::ValueEnum;

use super::error::{PostLinkError, PostLinkResult};

/// Extension of the file table written when `-o` is not given.
pub const DEFAULT_TABLE_EXTENSION: &str = "files";

/// Partitioning granularity for `--split`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SplitMode {
    /// One output module per source (translation unit).
    Source,
    /// One output module per kernel.
    Kernel,
}

/// How specialization constants are lowered for `--spec-const`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SpecConstMode {
    /// Spec constants are set at runtime; integer IDs and property files are emitted.
    #[value(name = "rt")]
    Runtime,
    /// Spec constants are set to their C++ default values.
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostLinkConfig {
    /// Input module, `-` for standard input.
    pub input: PathBuf,
    /// Output file: the file table, or the single module with `ir_output_only`.
    pub output: Option<PathBuf>,
    /// Directory for the files listed in the table.
    pub out_dir: Option<PathBuf>,
    /// Allow binary output on terminals.
    pub force: bool,
    pub ir_output_only: bool,
    /// Emit textual IR instead of the binary encoding.
    pub output_assembly: bool,
    pub split: Option<SplitMode>,
    pub symbols: bool,
    pub spec_const: Option<SpecConstMode>,
}

impl Default for PostLinkConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("-"),
            output: None,
            out_dir: None,
            force: false,
            ir_output_only: false,
            output_assembly: false,
            split: None,
            symbols: false,
            spec_const: None,
        }
    }
}

impl PostLinkConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    /// Reject option combinations that cannot produce a meaningful result.
    pub fn validate(&self) -> PostLinkResult<()> {
        if !self.do_split() && !self.do_spec_const() && !self.symbols {
            return Err(PostLinkError::Usage(
                "no actions specified; try --help for usage info".to_string(),
            ));
        }
        if self.ir_output_only && self.do_split() {
            return Err(PostLinkError::Usage(
                "--split can't be used with --ir-output-only".to_string(),
            ));
        }
        if self.ir_output_only && self.symbols {
            return Err(PostLinkError::Usage(
                "--symbols can't be used with --ir-output-only".to_string(),
            ));
        }
        Ok(())
    }

    pub fn do_split(&self) -> bool {
        self.split.is_some()
    }

    pub fn do_spec_const(&self) -> bool {
        self.spec_const.is_some()
    }

    pub fn one_kernel_per_module(&self) -> bool {
        self.split == Some(SplitMode::Kernel)
    }

    /// True when spec constants keep symbolic IDs to be set by the runtime.
    pub fn spec_const_at_runtime(&self) -> bool {
        self.spec_const == Some(SpecConstMode::Runtime)
    }

    /// The output path, defaulting to `<input stem>.files` in the working directory.
    pub fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => {
                let stem = self
                    .input
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "-".to_string());
                PathBuf::from(format!("{stem}.{DEFAULT_TABLE_EXTENSION}"))
            }
        }
    }

    /// Directory that receives per-partition files.
    pub fn result_dir(&self) -> PathBuf {
        match &self.out_dir {
            Some(dir) => dir.clone(),
            None => self
                .output_path()
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }

    pub fn code_extension(&self) -> &'static str {
        if self.output_assembly {
            ".ll"
        } else {
            ".bc"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_actions_is_usage_error() {
        let config = PostLinkConfig::new("in.bc");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, PostLinkError::Usage(_)));
        assert!(err.to_string().contains("no actions specified"));
    }

    #[test]
    fn test_ir_output_only_conflicts() {
        let config = PostLinkConfig {
            ir_output_only: true,
            split: Some(SplitMode::Kernel),
            ..PostLinkConfig::new("in.bc")
        };
        assert!(config.validate().unwrap_err().to_string().contains("--split"));

        let config = PostLinkConfig {
            ir_output_only: true,
            symbols: true,
            ..PostLinkConfig::new("in.bc")
        };
        assert!(config.validate().unwrap_err().to_string().contains("--symbols"));

        let config = PostLinkConfig {
            ir_output_only: true,
            spec_const: Some(SpecConstMode::Default),
            ..PostLinkConfig::new("in.bc")
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_output_path() {
        let config = PostLinkConfig::new("some/dir/example.bc");
        assert_eq!(config.output_path(), PathBuf::from("example.files"));
        assert_eq!(config.result_dir(), PathBuf::from(""));

        let config = PostLinkConfig {
            output: Some(PathBuf::from("out/table.txt")),
            ..PostLinkConfig::new("example.bc")
        };
        assert_eq!(config.result_dir(), PathBuf::from("out"));

        let config = PostLinkConfig {
            output: Some(PathBuf::from("out/table.txt")),
            out_dir: Some(PathBuf::from("gen")),
            ..PostLinkConfig::new("example.bc")
        };
        assert_eq!(config.result_dir(), PathBuf::from("gen"));
    }
}
