//! `threshold`: topological FDR thresholding on cluster extent
//!
//! Smoothness is estimated from the model residuals and assumed to be the
//! same for every voxel. The model is loaded from the directory of the bound
//! model file; the thresholded map is written to the working directory.

use super::model_dir;
use crate::config::Environment;
use crate::descriptor::ParamDescriptor;
use crate::outputs::{OutputPaths, OutputRule};
use crate::params::ResolvedParams;
use crate::script::matlab::{fixed6, quote, quote_path};
use crate::script::{ScriptBuilder, HEADER};
use crate::tool::ToolDefinition;
use crate::value::{ParamKind, ScalarKind};

const CLUSTER_FDR: &[&str] = &[
    "[SPM,xSPM] = spm_getSPM(xSPM);",
    "% checking if anything survived initial thresholding",
    "if isempty(xSPM.XYZ)",
    "    thresholded_XYZ = [];",
    "    thresholded_Z = [];",
    "else",
    "    FWHM  = xSPM.FWHM;",
    "    if FWHM(3) == Inf",
    "        V2R   = 1/prod(FWHM(1:2));",
    "    else",
    "        V2R   = 1/prod(FWHM);",
    "    end;",
    "",
    "    QPc = xSPM.Pc;",
    "    QPc = sort(QPc(:));",
    "",
    "    voxel_labels = spm_clusters(xSPM.XYZ);",
    "    nclusters = max(voxel_labels);",
    "",
    "    thresholded_XYZ = [];",
    "    thresholded_Z = [];",
    "",
    "    for i = 1:nclusters",
    "       cluster_size = sum(voxel_labels==i);",
    "       cluster_size_resels = cluster_size*V2R;",
    "       p = spm_P_clusterFDR(cluster_size_resels,xSPM.df,xSPM.STAT,xSPM.R,xSPM.n,xSPM.u,QPc);",
    "       if p < p_thresh",
    "           thresholded_XYZ = cat(2, thresholded_XYZ, xSPM.XYZ(:,voxel_labels == i));",
    "           thresholded_Z = cat(2, thresholded_Z, xSPM.Z(voxel_labels == i));",
    "       end",
    "    end",
    "end",
    "% workaround to write an empty volume",
    "if isempty(thresholded_XYZ)",
    "    thresholded_Z = [0];",
    "    thresholded_XYZ = [1 1 1]';",
    "end",
];

/// Header of the written map; the package writes the image beside it
const MAP_HEADER: &str = "thresholded_map.hdr";
const MAP_IMAGE: &str = "thresholded_map.img";

fn script(params: &ResolvedParams, env: &Environment) -> Vec<String> {
    let swd = model_dir(params, "spm_mat_file")
        .map(|dir| quote_path(&dir))
        .unwrap_or_else(|| quote(""));
    let mut script = ScriptBuilder::new();
    script
        .push(HEADER)
        .push(format!("xSPM.swd = {};", swd))
        .push(format!("xSPM.Ic = {};", params.int("contrast_index").unwrap_or(1)))
        .push(format!(
            "xSPM.u = {};",
            fixed6(params.float("height_threshold").unwrap_or(0.05))
        ))
        .push("xSPM.Im = [];");
    if params.flag("use_fwe_correction") {
        script.push("xSPM.thresDesc  = 'FWE';");
    } else {
        script.push("xSPM.thresDesc  = 'none';");
    }
    script
        .push(format!(
            "xSPM.k = {};",
            params.int("extent_threshold").unwrap_or(0)
        ))
        .push("xSPM.title = 'foo';")
        .push(format!(
            "p_thresh = {};",
            fixed6(params.float("extent_fdr_p_threshold").unwrap_or(0.05))
        ))
        .extend(CLUSTER_FDR.iter().copied())
        .push(format!(
            "spm_write_filtered(thresholded_Z,thresholded_XYZ,xSPM.DIM,xSPM.M,'foo', {});",
            quote_path(&env.cwd().join(MAP_HEADER))
        ));
    script.finish()
}

fn thresholded_map(_params: &ResolvedParams, env: &Environment) -> Option<OutputPaths> {
    Some(OutputPaths::Single(env.cwd().join(MAP_IMAGE)))
}

pub(super) fn definition() -> ToolDefinition {
    ToolDefinition::script("threshold", script)
        .summary("Topological FDR thresholding based on cluster extent")
        .params(vec![
            ParamDescriptor::new("spm_mat_file", ParamKind::Path)
                .mandatory()
                .help("absolute path to SPM.mat"),
            ParamDescriptor::new(
                "spmT_images",
                ParamKind::List {
                    of: ScalarKind::Path,
                    min_len: 1,
                },
            )
            .mandatory()
            .help("stat images from a T contrast"),
            ParamDescriptor::new("mask_image", ParamKind::Path),
            ParamDescriptor::new("beta_images", ParamKind::list(ScalarKind::Path)),
            ParamDescriptor::new("residual_image", ParamKind::Path),
            ParamDescriptor::new("RPVimage", ParamKind::Path),
            ParamDescriptor::new("contrast_index", ParamKind::Int)
                .mandatory()
                .help("which contrast (T map) to use"),
            ParamDescriptor::new("use_fwe_correction", ParamKind::Flag)
                .default_value(true)
                .help("FWE (Bonferroni) correction for the initial threshold"),
            ParamDescriptor::new("height_threshold", ParamKind::Float)
                .default_value(0.05)
                .help("p-value for the initial cluster-forming threshold"),
            ParamDescriptor::new("extent_threshold", ParamKind::Int)
                .default_value(0i64)
                .help("minimum cluster size"),
            ParamDescriptor::new("extent_fdr_p_threshold", ParamKind::Float)
                .default_value(0.05)
                .help("p threshold on FDR corrected cluster size probabilities"),
        ])
        .outputs(vec![OutputRule::predicted("thresholded_map", thresholded_map)])
}
