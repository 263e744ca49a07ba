//! Solver applications and their post-render document edits
//!
//! Every edit takes the rendered document and returns a rebuilt one. Observers are
//! addressed by position, in the same order as the configured observation list.

use crate::error::RenderError;
use crate::template::Node;
use crate::window::WindowType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const OBSERVATIONS: &str = "observations";
const OBSERVERS: &str = "observers";
const OBS_SPACE: &str = "obs space";
const OBS_FILTERS: &str = "obs filters";
const OBS_PRIOR_FILTERS: &str = "obs prior filters";

/// Solver application driven by a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Application {
    #[default]
    Variational,
    Hofx,
    #[serde(rename = "localensembleda")]
    LocalEnsembleDa,
    #[serde(rename = "obsfilters")]
    ObsFilters,
}

impl Application {
    pub fn name(&self) -> &'static str {
        match self {
            Application::Variational => "variational",
            Application::Hofx => "hofx",
            Application::LocalEnsembleDa => "localensembleda",
            Application::ObsFilters => "obsfilters",
        }
    }

    /// Executable template rendered for this application
    pub fn template_name(&self, window_type: WindowType) -> String {
        match self {
            Application::Variational | Application::Hofx => {
                format!("{}{}", self.name(), window_type)
            }
            Application::LocalEnsembleDa => "LocalEnsembleDA".to_string(),
            Application::ObsFilters => "qc_thinning".to_string(),
        }
    }

    /// Key of the binary name under `executables` in interface metadata
    pub fn executable_key(&self, window_type: WindowType) -> String {
        match self {
            Application::Variational | Application::Hofx => {
                format!("{}{}", self.name(), window_type)
            }
            Application::LocalEnsembleDa | Application::ObsFilters => self.name().to_string(),
        }
    }

    /// Runs on one process regardless of interface metadata
    pub fn single_process(&self) -> bool {
        matches!(self, Application::ObsFilters)
    }

    /// `{cycle_dir}/jedi_{app}_config.yaml`
    pub fn config_file(&self, cycle_dir: &Path) -> PathBuf {
        cycle_dir.join(format!("jedi_{}_config.yaml", self.name()))
    }

    /// `{cycle_dir}/jedi_{app}_log.log`
    pub fn log_file(&self, cycle_dir: &Path) -> PathBuf {
        cycle_dir.join(format!("jedi_{}_log.log", self.name()))
    }

    /// Per-member configuration for ensemble hofx rendering
    pub fn member_config_file(&self, cycle_dir: &Path, member: u32) -> PathBuf {
        cycle_dir.join(format!("jedi_{}_mem{}_config.yaml", self.name(), member))
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Application {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "variational" => Ok(Application::Variational),
            "hofx" => Ok(Application::Hofx),
            "localensembleda" => Ok(Application::LocalEnsembleDa),
            "obsfilters" => Ok(Application::ObsFilters),
            other => Err(format!(
                "Unknown application '{}' (expected variational, hofx, localensembleda or obsfilters)",
                other
            )),
        }
    }
}

/// Inputs shared by the document edits
#[derive(Debug, Clone)]
pub struct EditParams<'a> {
    pub cycle_dir: &'a Path,
    /// Window begin in directory form
    pub window_begin: &'a str,
    pub observations: &'a [String],
    pub extension: &'a str,
}

/// A file to copy before dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCopy {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Rebuild `doc` with every observer replaced by `f(index, observer)`
pub fn map_observers<F>(doc: &Node, mut f: F) -> Result<Node, RenderError>
where
    F: FnMut(usize, &Node) -> Result<Node, RenderError>,
{
    let observers = observers(doc)?;
    let rebuilt = observers
        .iter()
        .enumerate()
        .map(|(i, observer)| f(i, observer))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(replace_path(doc, &[OBSERVATIONS, OBSERVERS], Node::Seq(rebuilt)))
}

/// The `observations.observers` sequence
pub fn observers(doc: &Node) -> Result<&[Node], RenderError> {
    doc.get_path(&[OBSERVATIONS, OBSERVERS])
        .and_then(Node::as_seq)
        .ok_or_else(|| RenderError::MissingPath {
            path: "observations.observers".to_string(),
            expected: "sequence",
        })
}

/// Copy of `node` with the value at `path` replaced (created when absent)
fn replace_path(node: &Node, path: &[&str], value: Node) -> Node {
    let Some((head, rest)) = path.split_first() else {
        return value;
    };
    let mut mapping = node.as_map().cloned().unwrap_or_default();
    let child = match mapping.get(head) {
        Some(existing) => replace_path(existing, rest, value),
        None => replace_path(&Node::null(), rest, value),
    };
    mapping.insert(*head, child);
    Node::Map(mapping)
}

/// Copy of `node` with the key at `path` removed
fn remove_path(node: &Node, path: &[&str]) -> Node {
    match (path.split_first(), node.as_map()) {
        (Some((head, rest)), Some(map)) => {
            let rebuilt = map
                .iter()
                .filter(|(k, _)| !(rest.is_empty() && k.as_str() == *head))
                .map(|(k, v)| {
                    if k.as_str() == *head {
                        (k.clone(), remove_path(v, rest))
                    } else {
                        (k.clone(), v.clone())
                    }
                })
                .collect();
            Node::Map(rebuilt)
        }
        _ => node.clone(),
    }
}

fn observer_str<'n>(observer: &'n Node, path: &[&str]) -> Result<&'n str, RenderError> {
    observer
        .get_path(path)
        .and_then(Node::as_str)
        .ok_or_else(|| RenderError::MissingPath {
            path: path.join("."),
            expected: "string",
        })
}

/// 4D hofx: linear time interpolation for every observer
pub fn add_time_interpolation(doc: &Node) -> Result<Node, RenderError> {
    map_observers(doc, |_, observer| {
        Ok(replace_path(
            observer,
            &["get values"],
            Node::map([("time interpolation", Node::str("linear"))]),
        ))
    })
}

/// Append a GeoVaLs saver filter to every observer.
///
/// Goes to `obs filters` when present, else to `obs prior filters` (created if absent).
pub fn append_gomsaver(
    doc: &Node,
    params: &EditParams<'_>,
    member: Option<u32>,
) -> Result<Node, RenderError> {
    let member_suffix = member.map(|m| format!("_mem{}", m)).unwrap_or_default();
    map_observers(doc, |index, observer| {
        let observation = params.observations.get(index).ok_or_else(|| {
            RenderError::MissingPath {
                path: format!("observations[{}]", index),
                expected: "configured observation",
            }
        })?;
        let filename = params.cycle_dir.join(format!(
            "{}-geovals.{}{}.{}",
            observation, params.window_begin, member_suffix, params.extension
        ));
        let saver = Node::map([
            ("filter", Node::str("GOMsaver")),
            ("filename", Node::str(filename.to_string_lossy())),
        ]);

        let key = if observer.get_path(&[OBS_FILTERS]).is_some() {
            OBS_FILTERS
        } else {
            OBS_PRIOR_FILTERS
        };
        let mut filters = observer
            .get_path(&[key])
            .and_then(Node::as_seq)
            .map(<[Node]>::to_vec)
            .unwrap_or_default();
        filters.push(saver);
        Ok(replace_path(observer, &[key], Node::Seq(filters)))
    })
}

/// Ensemble hofx: suffix each observer's output file with the member number
pub fn tag_member_output(
    doc: &Node,
    params: &EditParams<'_>,
    member: u32,
) -> Result<Node, RenderError> {
    let path = [OBS_SPACE, "obsdataout", "engine", "obsfile"];
    let suffix = format!(".{}", params.extension);
    map_observers(doc, |_, observer| {
        let outfile = observer_str(observer, &path)?;
        let tagged = match outfile.strip_suffix(&suffix) {
            Some(stem) => format!("{}_{:02}{}", stem, member, suffix),
            None => format!("{}_{:02}", outfile, member),
        };
        Ok(replace_path(observer, &path, Node::str(tagged)))
    })
}

/// Local ensemble DA: observers write no output
pub fn strip_obs_output(doc: &Node) -> Result<Node, RenderError> {
    map_observers(doc, |_, observer| {
        Ok(remove_path(observer, &[OBS_SPACE, "obsdataout"]))
    })
}

/// `{stem}_orig.{ext}` beside the original file
pub fn original_copy_path(obsfile: &Path) -> PathBuf {
    let stem = obsfile
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match obsfile.extension() {
        Some(ext) => format!("{}_orig.{}", stem, ext.to_string_lossy()),
        None => format!("{}_orig", stem),
    };
    obsfile.with_file_name(name)
}

/// Observation filtering: rewrite every observer into a thinning pass that reads a
/// copy of its input and writes over the original path.
///
/// The observer list moves to the top-level `observations` key. Returns the rebuilt
/// document and the copies that must be made before dispatch.
pub fn thinning_config(doc: &Node) -> Result<(Node, Vec<FileCopy>), RenderError> {
    let mut copies = Vec::new();
    let mut rebuilt = Vec::new();

    for observer in observers(doc)? {
        let name = observer_str(observer, &[OBS_SPACE, "name"])?;
        let obsfile = observer_str(observer, &[OBS_SPACE, "obsdatain", "engine", "obsfile"])?;
        let simulated = observer
            .get_path(&[OBS_SPACE, "simulated variables"])
            .cloned()
            .ok_or_else(|| RenderError::MissingPath {
                path: "obs space.simulated variables".to_string(),
                expected: "sequence",
            })?;

        let original = PathBuf::from(obsfile);
        let copy = original_copy_path(&original);
        let engine = |file: &str| {
            Node::map([(
                "engine",
                Node::map([("type", Node::str("H5File")), ("obsfile", Node::str(file))]),
            )])
        };

        let obs_space = Node::map([
            ("name", Node::str(name)),
            ("obsdatain", engine(&copy.to_string_lossy())),
            ("obsdataout", engine(obsfile)),
            ("simulated variables", simulated),
        ]);
        let thinning = Node::map([
            ("filter", Node::str("Thinning")),
            ("amount", Node::float(0.75)),
            ("random seed", Node::int(0)),
            ("member", Node::int(1)),
            ("action", Node::map([("name", Node::str("reduce obs space"))])),
        ]);
        rebuilt.push(Node::map([
            (OBS_SPACE, obs_space),
            (OBS_FILTERS, Node::Seq(vec![thinning])),
            (
                "expectVariablesNotToExist",
                Node::Seq(vec![Node::str("VariablesNotToExist")]),
            ),
        ]));
        copies.push(FileCopy {
            from: original,
            to: copy,
        });
    }

    let without = remove_path(doc, &[OBSERVATIONS]);
    Ok((
        replace_path(&without, &[OBSERVATIONS], Node::Seq(rebuilt)),
        copies,
    ))
}
