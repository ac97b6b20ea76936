//! Native image-processing executables
//!
//! Output names derived for these tools follow one scheme: take the stem of an
//! input image (every image extension stripped), append a suffix, add the
//! extension of the configured output type.

mod bet;
mod fast;
mod flirt;
mod fnirt;
mod mcflirt;

use crate::config::Environment;
use crate::descriptor::DeriveContext;
use crate::outputs::{OutputPaths, sibling};
use crate::params::ResolvedParams;
use crate::tool::ToolDefinition;
use crate::value::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Recognised image extensions, longest first
pub const IMAGE_EXTENSIONS: &[&str] = &[".nii.gz", ".img.gz", ".nii", ".img", ".hdr"];

pub(crate) fn definitions() -> Vec<Arc<ToolDefinition>> {
    let flirt = Arc::new(flirt::definition());
    vec![
        Arc::new(bet::definition()),
        Arc::new(fast::definition()),
        Arc::new(flirt::apply_xfm(Arc::clone(&flirt))),
        flirt,
        Arc::new(mcflirt::definition()),
        Arc::new(fnirt::definition()),
        Arc::new(fnirt::apply_warp()),
    ]
}

/// Split an image path into directory, stem and image extension
///
/// ```
/// use neurowrap_core::tools::fsl::split_image_name;
/// use std::path::Path;
///
/// let (dir, stem, ext) = split_image_name(Path::new("/data/foo.nii.gz"));
/// assert_eq!(dir, Path::new("/data"));
/// assert_eq!((stem.as_str(), ext), ("foo", ".nii.gz"));
/// ```
pub fn split_image_name(path: &Path) -> (PathBuf, String, &'static str) {
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    for ext in IMAGE_EXTENSIONS {
        if let Some(stem) = name.strip_suffix(ext) {
            if !stem.is_empty() {
                return (dir, stem.to_string(), ext);
            }
        }
    }
    (dir, name, "")
}

/// `<cwd>/<stem of input><suffix><ext>`
pub(crate) fn derive_in_cwd(ctx: &DeriveContext<'_>, input: &str, suffix: &str) -> Option<Value> {
    let source = ctx.first_path(input)?;
    let (_, stem, _) = split_image_name(&source);
    let env = ctx.env();
    Some(Value::path(sibling(env.cwd(), &stem, suffix, env.extension())))
}

/// `<dir of path>/<stem of path><suffix><ext>`
pub(crate) fn with_suffix(path: &Path, suffix: &str, env: &Environment) -> PathBuf {
    let (dir, stem, _) = split_image_name(path);
    sibling(&dir, &stem, suffix, env.extension())
}

/// Directory and stem of `path`, stem escaped for use in a glob pattern
pub(crate) fn glob_base(path: &Path) -> (PathBuf, String) {
    let (dir, stem, _) = split_image_name(path);
    (dir, glob::Pattern::escape(&stem))
}

/// The resolved value of a path parameter, as a single predicted output
pub(crate) fn resolved_path(params: &ResolvedParams, name: &str) -> Option<OutputPaths> {
    params.path(name).map(|p| OutputPaths::Single(p.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OutputType, WrapConfig};

    #[test]
    fn split_strips_one_image_extension() {
        assert_eq!(
            split_image_name(Path::new("/d/foo.img.gz")),
            (PathBuf::from("/d"), "foo".to_string(), ".img.gz")
        );
        assert_eq!(
            split_image_name(Path::new("foo.mat")),
            (PathBuf::new(), "foo.mat".to_string(), "")
        );
    }

    #[test]
    fn suffix_keeps_directory_and_uses_output_type() {
        let config = WrapConfig::new().with_output_type(OutputType::NiftiGz);
        let env = Environment::with_cwd(&config, "/work");
        assert_eq!(
            with_suffix(Path::new("/out/brain.nii"), "_mask", &env),
            PathBuf::from("/out/brain_mask.nii.gz")
        );
    }
}
