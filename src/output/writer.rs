//! Artifact file writing.
//!
//! Every file is created, written, flushed and closed before the next one is
//! opened. The first failure aborts the run; files already written stay.

use std::fs::File;
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};

use crate::core::{PostLinkConfig, PostLinkError, PostLinkResult};
use crate::ir::{bitcode, Module};
use crate::spec_const::SpecIdMap;

use super::property_set::PropertySetRegistry;
use super::table::SimpleTable;

fn is_stdout(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Writes per-partition artifacts next to the output file.
pub struct ArtifactWriter<'c> {
    config: &'c PostLinkConfig,
}

impl<'c> ArtifactWriter<'c> {
    pub fn new(config: &'c PostLinkConfig) -> Self {
        Self { config }
    }

    /// `<dir>/<output stem>_<index><ext>`
    pub fn result_file_name(&self, ext: &str, index: usize) -> PathBuf {
        let output = self.config.output_path();
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.config
            .result_dir()
            .join(format!("{stem}_{index}{ext}"))
    }

    /// Write `content` to `path` (`-` is standard output).
    pub fn write_to_file(&self, path: &Path, content: &[u8]) -> PostLinkResult<()> {
        let result = if is_stdout(path) {
            let mut out = io::stdout().lock();
            out.write_all(content).and_then(|_| out.flush())
        } else {
            let file = File::create(path).map_err(|e| PostLinkError::io(path, e))?;
            let mut out = BufWriter::new(file);
            out.write_all(content).and_then(|_| out.flush())
        };
        result.map_err(|e| PostLinkError::io(path, e))?;
        log::debug!("wrote {} ({} bytes)", path.display(), content.len());
        Ok(())
    }

    /// Save `module` as text or binary IR depending on the configuration.
    pub fn save_module(&self, module: &Module, path: &Path) -> PostLinkResult<()> {
        if self.config.output_assembly {
            return self.write_to_file(path, module.to_string().as_bytes());
        }
        if is_stdout(path) && !self.config.force && io::stdout().is_terminal() {
            return Err(PostLinkError::BinaryToTerminal);
        }
        let bytes = bitcode::write(module).map_err(|source| PostLinkError::Encode {
            path: path.display().to_string(),
            source,
        })?;
        self.write_to_file(path, &bytes)
    }

    pub fn save_result_modules(&self, modules: &[Module]) -> PostLinkResult<Vec<String>> {
        let ext = self.config.code_extension();
        let mut files = Vec::with_capacity(modules.len());
        for (i, module) in modules.iter().enumerate() {
            let path = self.result_file_name(ext, i);
            self.save_module(module, &path)?;
            files.push(path.display().to_string());
        }
        Ok(files)
    }

    pub fn save_spec_constant_id_maps(&self, maps: &[SpecIdMap]) -> PostLinkResult<Vec<String>> {
        let mut files = Vec::with_capacity(maps.len());
        for (i, map) in maps.iter().enumerate() {
            let path = self.result_file_name(".prop", i);
            let mut registry = PropertySetRegistry::new();
            registry.add_spec_constants(map);
            self.write_to_file(&path, registry.to_string().as_bytes())?;
            files.push(path.display().to_string());
        }
        Ok(files)
    }

    pub fn save_result_symbols_lists(&self, lists: &[String]) -> PostLinkResult<Vec<String>> {
        let mut files = Vec::with_capacity(lists.len());
        for (i, list) in lists.iter().enumerate() {
            let path = self.result_file_name(".sym", i);
            self.write_to_file(&path, list.as_bytes())?;
            files.push(path.display().to_string());
        }
        Ok(files)
    }

    pub fn save_table(&self, table: &SimpleTable, path: &Path) -> PostLinkResult<()> {
        self.write_to_file(path, table.to_string().as_bytes())
    }
}
