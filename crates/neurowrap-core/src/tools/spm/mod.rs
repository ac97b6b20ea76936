//! The scripted statistical package
//!
//! Design and estimation tools fill the package's job structure field by
//! field; contrast estimation, thresholding and the combined second-level
//! tools emit their own statements. Everything ends up as an ordered
//! statement list run by the configured interpreter.

mod contrast;
mod design;
mod estimate;
mod threshold;
mod ttest;

use crate::config::Environment;
use crate::descriptor::DeriveContext;
use crate::outputs::{GlobSpec, JsonModelReader, OutputPaths};
use crate::params::ResolvedParams;
use crate::script::matlab::{fixed6, quote, quote_path};
use crate::tool::ToolDefinition;
use crate::value::{Contrast, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name of the saved model structure
pub const MODEL_FILE: &str = "SPM.mat";

pub(crate) fn definitions() -> Vec<Arc<ToolDefinition>> {
    let factorial = Arc::new(design::factorial_design());
    vec![
        Arc::new(design::level1_design()),
        Arc::new(design::one_sample_ttest_design(Arc::clone(&factorial))),
        Arc::new(design::two_sample_ttest_design(Arc::clone(&factorial))),
        factorial,
        Arc::new(estimate::definition()),
        Arc::new(contrast::definition()),
        Arc::new(threshold::definition()),
        Arc::new(ttest::one_sample()),
        Arc::new(ttest::two_sample()),
        Arc::new(ttest::multiple_regression()),
    ]
}

/// Default for output-directory parameters: the sampled working directory
pub(crate) fn working_dir(ctx: &DeriveContext<'_>) -> Option<Value> {
    Some(Value::path(ctx.env().cwd()))
}

/// `<dir>/SPM.mat`
pub(crate) fn model_file(dir: &Path) -> PathBuf {
    dir.join(MODEL_FILE)
}

/// Directory holding the model file bound to `name`
pub(crate) fn model_dir(params: &ResolvedParams, name: &str) -> Option<PathBuf> {
    let file = params.first_path(name)?;
    Some(file.parent().map(Path::to_path_buf).unwrap_or_default())
}

/// Sorted glob next to the model file bound to `name`
pub(crate) fn beside_model(params: &ResolvedParams, name: &str, pattern: &str) -> Option<GlobSpec> {
    model_dir(params, name).map(|dir| GlobSpec::new(dir, pattern))
}

/// Statements that write the file lists of the saved model at `model` to the
/// JSON export [`JsonModelReader`] reads back.
///
/// Contrasts go into a cell array so a single contrast still encodes as a
/// JSON array.
pub(crate) fn export_model(model: &Path) -> Vec<String> {
    vec![
        format!("load({});", quote_path(model)),
        "model_export.beta_files = {};".to_string(),
        "if isfield(SPM,'Vbeta') && ~isempty(SPM.Vbeta), model_export.beta_files = {SPM.Vbeta(:).fname}; end;".to_string(),
        "model_export.contrasts = {};".to_string(),
        "if isfield(SPM,'xCon'), for ic = 1:numel(SPM.xCon), model_export.contrasts{end+1} = struct('name', SPM.xCon(ic).name, 'con_file', SPM.xCon(ic).Vcon.fname, 'stat_file', SPM.xCon(ic).Vspm.fname); end; end;".to_string(),
        format!(
            "fid = fopen({}, 'w');",
            quote_path(&JsonModelReader::export_path(model))
        ),
        "fprintf(fid, '%s', jsonencode(model_export));".to_string(),
        "fclose(fid);".to_string(),
    ]
}

/// Model file in the working directory, for tools that write their design there
pub(crate) fn cwd_model(_params: &ResolvedParams, env: &Environment) -> Option<PathBuf> {
    Some(model_file(env.cwd()))
}

pub(crate) fn cwd_model_output(params: &ResolvedParams, env: &Environment) -> Option<OutputPaths> {
    cwd_model(params, env).map(OutputPaths::Single)
}

pub(crate) fn cwd_glob(pattern: &'static str, env: &Environment) -> GlobSpec {
    GlobSpec::new(env.cwd(), pattern)
}

/// Contrast session statements (`consess{i}...`).
///
/// Column indices are looked up by name in the script variable `lookup`.
/// Session multipliers need the per-column session vector `condsess`, which
/// only the standalone contrast script sets up, so `sessions` switches them on.
/// T contrasts come first when `t_first` is set, mirroring the two emission
/// orders the package's scripts use.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Consess<'a> {
    pub contrasts: &'a [Contrast],
    pub lookup: &'a str,
    pub sessions: bool,
    pub t_first: bool,
}

impl Consess<'_> {
    pub(crate) fn statements(&self) -> Vec<String> {
        let mut statements = Vec::new();
        if self.t_first {
            for (i, contrast) in self.contrasts.iter().enumerate() {
                if contrast.is_t() {
                    statements.extend(self.t_contrast(i + 1, contrast));
                }
            }
            for (i, contrast) in self.contrasts.iter().enumerate() {
                if !contrast.is_t() {
                    statements.extend(self.f_contrast(i + 1, contrast));
                }
            }
        } else {
            for (i, contrast) in self.contrasts.iter().enumerate() {
                if contrast.is_t() {
                    statements.extend(self.t_contrast(i + 1, contrast));
                } else {
                    statements.extend(self.f_contrast(i + 1, contrast));
                }
            }
        }
        statements
    }

    fn t_contrast(&self, number: usize, contrast: &Contrast) -> Vec<String> {
        let mut statements = vec![
            format!("consess{{{}}}.tcon.name   = {};", number, quote(contrast.name())),
            format!("consess{{{}}}.tcon.convec = zeros(1,numel(names));", number),
        ];
        for (c, condition) in contrast.conditions().iter().enumerate() {
            statements.push(format!(
                "idx = strmatch({},{},'exact');",
                quote(condition),
                self.lookup
            ));
            let weight = contrast.weight(c);
            match contrast.sessions() {
                Some(sessions) if self.sessions => {
                    for (s, multiplier) in sessions.iter().enumerate() {
                        statements.push(format!("sidx = find(condsess(idx)=={});", s + 1));
                        statements.push(format!(
                            "consess{{{}}}.tcon.convec(idx(sidx)) = {};",
                            number,
                            fixed6(multiplier * weight)
                        ));
                    }
                }
                _ => statements.push(format!(
                    "consess{{{}}}.tcon.convec(idx) = {};",
                    number,
                    fixed6(weight)
                )),
            }
        }
        statements
    }

    fn f_contrast(&self, number: usize, contrast: &Contrast) -> Vec<String> {
        let mut statements = vec![format!(
            "consess{{{}}}.fcon.name   =  {};",
            number,
            quote(contrast.name())
        )];
        if let Contrast::F { components, .. } = contrast {
            for (k, component) in components.iter().enumerate() {
                let Some(t_index) = self
                    .contrasts
                    .iter()
                    .position(|c| c.is_t() && c.name() == component.name())
                else {
                    continue;
                };
                statements.push(format!(
                    "consess{{{}}}.fcon.convec{{{}}} = consess{{{}}}.tcon.convec;",
                    number,
                    k + 1,
                    t_index + 1
                ));
            }
        }
        statements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contrasts() -> Vec<Contrast> {
        vec![
            Contrast::t("Task>Baseline", &["Task-Odd", "Task-Even"], &[0.5, 0.5]),
            Contrast::TSessioned {
                name: "Odd early".into(),
                conditions: vec!["Task-Odd".into()],
                weights: vec![1.0],
                sessions: vec![1.0, 0.0],
            },
            Contrast::F {
                name: "Any".into(),
                components: vec![Contrast::TSimple {
                    name: "Task>Baseline".into(),
                    conditions: Vec::new(),
                }],
            },
        ]
    }

    #[test]
    fn t_contrasts_index_by_condition_name() {
        let contrasts = contrasts();
        let statements = Consess {
            contrasts: &contrasts[..1],
            lookup: "condnames",
            sessions: true,
            t_first: true,
        }
        .statements();
        assert_eq!(
            statements,
            vec![
                "consess{1}.tcon.name   = 'Task>Baseline';",
                "consess{1}.tcon.convec = zeros(1,numel(names));",
                "idx = strmatch('Task-Odd',condnames,'exact');",
                "consess{1}.tcon.convec(idx) = 0.500000;",
                "idx = strmatch('Task-Even',condnames,'exact');",
                "consess{1}.tcon.convec(idx) = 0.500000;",
            ]
        );
    }

    #[test]
    fn session_multipliers_scale_weights() {
        let contrasts = contrasts();
        let statements = Consess {
            contrasts: &contrasts,
            lookup: "condnames",
            sessions: true,
            t_first: true,
        }
        .statements();
        assert!(statements.contains(&"sidx = find(condsess(idx)==2);".to_string()));
        assert!(statements.contains(&"consess{2}.tcon.convec(idx(sidx)) = 0.000000;".to_string()));
        assert_eq!(
            statements.last().map(String::as_str),
            Some("consess{3}.fcon.convec{1} = consess{1}.tcon.convec;")
        );
    }

    #[test]
    fn without_session_vector_multipliers_are_ignored() {
        let contrasts = contrasts();
        let statements = Consess {
            contrasts: &contrasts,
            lookup: "names",
            sessions: false,
            t_first: false,
        }
        .statements();
        assert!(!statements.iter().any(|s| s.contains("sidx")));
        assert!(statements.contains(&"consess{2}.tcon.convec(idx) = 1.000000;".to_string()));
    }

    #[test]
    fn model_export_lands_where_the_reader_looks() {
        let statements = export_model(Path::new("/study/SPM.mat"));
        assert_eq!(statements[0], "load('/study/SPM.mat');");
        assert_eq!(
            JsonModelReader::export_path(Path::new("/study/SPM.mat")),
            PathBuf::from("/study/SPM.json")
        );
        assert!(statements.contains(&"fid = fopen('/study/SPM.json', 'w');".to_string()));
        assert!(statements.iter().any(|s| s.contains("{SPM.Vbeta(:).fname}")));
        assert!(statements.iter().any(|s| s.contains("SPM.xCon(ic).Vspm.fname")));
        assert_eq!(statements.last().map(String::as_str), Some("fclose(fid);"));
    }

    #[test]
    fn model_file_sits_in_directory() {
        assert_eq!(model_file(Path::new("/work")), PathBuf::from("/work/SPM.mat"));
    }
}
