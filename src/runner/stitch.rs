use crate::recipe::{step_id, Step};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A selected step with its concrete manifest paths
#[derive(Debug, Clone, PartialEq)]
pub struct StitchedStep<'a> {
    /// Index of the step in the recipe's full step list
    pub index: usize,
    pub step_id: String,
    pub step: &'a Step,
    pub input: Option<PathBuf>,
    pub output: PathBuf,
}

/// File name of the intermediate manifest produced by `step_id`
pub fn temp_output_name(step_id: &str) -> String {
    format!("{}_output.jsonl", step_id)
}

/// Resolve the input and output manifest of every selected step.
///
/// A step reads its explicit `input_manifest`, else the previous step's output
/// (the recipe input for the first step). It writes its explicit
/// `output_manifest`, else the recipe output when it is the last step, else
/// `<tmp_dir>/<step_id>_output.jsonl`. Empty paths count as unset.
pub fn stitch<'a>(
    selected: &[(usize, &'a Step)],
    recipe_input: Option<&Path>,
    recipe_output: Option<&Path>,
    tmp_dir: &Path,
) -> Vec<StitchedStep<'a>> {
    let mut previous_output = non_empty(recipe_input);
    let last = selected.len().saturating_sub(1);

    selected
        .iter()
        .enumerate()
        .map(|(position, &(index, step))| {
            let id = step_id(step, index);

            let input = non_empty(step.input_manifest.as_deref()).or_else(|| previous_output.clone());

            let output = non_empty(step.output_manifest.as_deref())
                .or_else(|| {
                    if position == last {
                        non_empty(recipe_output)
                    } else {
                        None
                    }
                })
                .unwrap_or_else(|| tmp_dir.join(temp_output_name(&id)));

            debug!(
                step = %id,
                input = ?input,
                output = %output.display(),
                "Stitched step"
            );
            previous_output = Some(output.clone());

            StitchedStep {
                index,
                step_id: id,
                step,
                input,
                output,
            }
        })
        .collect()
}

fn non_empty(path: Option<&Path>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps() -> Vec<Step> {
        vec![
            Step::new("PassThrough").with_id("A"),
            Step::new("PassThrough").with_id("B"),
            Step::new("PassThrough").with_id("C"),
        ]
    }

    fn paths(stitched: &[StitchedStep<'_>]) -> Vec<(Option<PathBuf>, PathBuf)> {
        stitched
            .iter()
            .map(|s| (s.input.clone(), s.output.clone()))
            .collect()
    }

    #[test]
    fn test_implicit_chain() {
        let steps = steps();
        let selected: Vec<_> = steps.iter().enumerate().collect();
        let tmp = Path::new("/ws/.tmp/run");
        let stitched = stitch(&selected, Some(Path::new("I")), Some(Path::new("O")), tmp);

        assert_eq!(
            paths(&stitched),
            vec![
                (Some(PathBuf::from("I")), tmp.join("A_output.jsonl")),
                (Some(tmp.join("A_output.jsonl")), tmp.join("B_output.jsonl")),
                (Some(tmp.join("B_output.jsonl")), PathBuf::from("O")),
            ]
        );
    }

    #[test]
    fn test_explicit_overrides_win() {
        let mut steps = steps();
        steps[1].input_manifest = Some(PathBuf::from("side.jsonl"));
        steps[1].output_manifest = Some(PathBuf::from("b.jsonl"));
        steps[2].output_manifest = Some(PathBuf::from("c.jsonl"));
        let selected: Vec<_> = steps.iter().enumerate().collect();
        let tmp = Path::new("tmp");
        let stitched = stitch(&selected, None, Some(Path::new("O")), tmp);

        assert_eq!(
            paths(&stitched),
            vec![
                (None, tmp.join("A_output.jsonl")),
                (Some(PathBuf::from("side.jsonl")), PathBuf::from("b.jsonl")),
                (Some(PathBuf::from("b.jsonl")), PathBuf::from("c.jsonl")),
            ]
        );
    }

    #[test]
    fn test_empty_paths_are_unset() {
        let mut steps = steps();
        steps.truncate(1);
        steps[0].id = None;
        steps[0].input_manifest = Some(PathBuf::new());
        let selected: Vec<_> = steps.iter().enumerate().collect();
        let tmp = Path::new("tmp");
        let stitched = stitch(&selected, Some(Path::new("")), Some(Path::new("")), tmp);

        assert_eq!(paths(&stitched), vec![(None, tmp.join("step_0_output.jsonl"))]);
    }

    #[test]
    fn test_original_indices_name_temps() {
        let steps = steps();
        let selected = vec![(1, &steps[1]), (2, &steps[2])];
        let mut unnamed = steps.clone();
        unnamed[1].id = None;
        let selected_unnamed = vec![(1, &unnamed[1]), (2, &unnamed[2])];
        let tmp = Path::new("tmp");

        let stitched = stitch(&selected_unnamed, None, None, tmp);
        assert_eq!(stitched[0].step_id, "step_1");
        assert_eq!(stitched[1].input, Some(tmp.join("step_1_output.jsonl")));
        assert_eq!(stitched[1].output, tmp.join("C_output.jsonl"));

        assert_eq!(stitch(&selected, None, None, tmp)[0].index, 1);
    }
}
