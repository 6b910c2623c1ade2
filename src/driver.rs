//! The post-link pipeline.
//!
//! One run reads a single input module, optionally lowers specialization
//! constants, optionally splits the module into partitions and finally writes
//! either the transformed module alone or a file table listing the artifacts
//! of every output module.

use std::path::PathBuf;

use crate::core::{PostLinkConfig, PostLinkResult};
use crate::ir::read_module_file;
use crate::output::{ArtifactWriter, SimpleTable, COL_CODE, COL_PROPS, COL_SYM};
use crate::spec_const::{SpecConstantsPass, SpecIdMap};
use crate::split::{split_module, KernelModuleMap};

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `--ir-output-only`: the transformed module was written to this path.
    Module(PathBuf),
    /// A file table with `rows` rows was written to `path`.
    Table { path: PathBuf, rows: usize },
}

/// Run the whole pipeline for `config`.
pub fn run(config: &PostLinkConfig) -> PostLinkResult<Outcome> {
    config.validate()?;

    let mut module = read_module_file(&config.input)?;
    let output = config.output_path();
    let writer = ArtifactWriter::new(config);

    let kernel_map = if config.do_split() || config.symbols {
        KernelModuleMap::collect(&module, config.one_kernel_per_module())
    } else {
        KernelModuleMap::default()
    };

    let spec_consts_met = match config.spec_const {
        Some(_) => SpecConstantsPass::new(config.spec_const_at_runtime()).run(&mut module)?,
        None => false,
    };

    if config.ir_output_only {
        writer.save_module(&module, &output)?;
        log::info!("wrote transformed module to {}", output.display());
        return Ok(Outcome::Module(output));
    }

    let mut modules = if config.do_split() {
        split_module(&module, &kernel_map)
    } else {
        Vec::new()
    };
    if modules.is_empty() {
        // A code result is always produced, even for unmodified input
        modules.push(module);
    }

    let mut table = SimpleTable::new();

    let code_files = if spec_consts_met || modules.len() > 1 {
        writer.save_result_modules(&modules)?
    } else {
        vec![config.input.display().to_string()]
    };
    table.add_column(COL_CODE, code_files)?;

    if config.spec_const_at_runtime() {
        let maps: Vec<SpecIdMap> = modules
            .iter()
            .map(|m| {
                let mut ids = SpecIdMap::new();
                if spec_consts_met {
                    SpecConstantsPass::collect_spec_constant_metadata(m, &mut ids);
                }
                ids
            })
            .collect();
        table.add_column(COL_PROPS, writer.save_spec_constant_id_maps(&maps)?)?;
    }

    if config.symbols {
        let mut lists = if config.do_split() {
            kernel_map.symbols_lists()
        } else {
            vec![kernel_map.merged_symbols_list()]
        };
        if lists.is_empty() {
            lists.push(String::new());
        }
        table.add_column(COL_SYM, writer.save_result_symbols_lists(&lists)?)?;
    }

    writer.save_table(&table, &output)?;
    log::info!(
        "wrote file table {} ({} rows)",
        output.display(),
        table.num_rows()
    );
    Ok(Outcome::Table {
        path: output,
        rows: table.num_rows(),
    })
}
