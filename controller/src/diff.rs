use json_patch::PatchOperation;
use serde::Serialize;

/// Describe what changed between two versions of an object, one JSON patch operation per line
/// ordered by path, for log messages.
pub(crate) fn object_diff<T>(old: &T, new: &T) -> serde_json::Result<String>
where
    T: Serialize,
{
    let old = serde_json::to_value(old)?;
    let new = serde_json::to_value(new)?;
    let mut changes: Vec<(String, String)> = json_patch::diff(&old, &new)
        .0
        .into_iter()
        .map(describe)
        .collect();
    changes.sort();
    Ok(changes
        .into_iter()
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n"))
}

/// The path an operation touches and a line describing it.
fn describe(operation: PatchOperation) -> (String, String) {
    match operation {
        PatchOperation::Add(op) => (op.path.clone(), format!("add {}: {}", op.path, op.value)),
        PatchOperation::Remove(op) => (op.path.clone(), format!("remove {}", op.path)),
        PatchOperation::Replace(op) => (
            op.path.clone(),
            format!("replace {}: {}", op.path, op.value),
        ),
        PatchOperation::Move(op) => (op.path.clone(), format!("move {} to {}", op.from, op.path)),
        PatchOperation::Copy(op) => (op.path.clone(), format!("copy {} to {}", op.from, op.path)),
        PatchOperation::Test(op) => (op.path.clone(), format!("test {}: {}", op.path, op.value)),
    }
}
