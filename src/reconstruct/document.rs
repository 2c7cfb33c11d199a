//! Extraction of typed records from the generic tree.

use crate::error::ReconstructionError;
use crate::snapshot::model::{InvocationRecord, SnapshotContainer, ValueRole, ValueSnapshot};
use crate::snapshot::tree::Node;

/// Rebuild the container a parsed document describes.
pub fn extract_container(root: &Node) -> Result<SnapshotContainer, ReconstructionError> {
    let context = root.tag.as_str();
    let mut container = SnapshotContainer::new(
        required_text(root, context, "instance_name")?,
        required_text(root, context, "snapshot_name")?,
        required_text(root, context, "session_id")?,
    );

    for (index, function) in required_list(root, context, "functions_list")?
        .iter()
        .enumerate()
    {
        let record = extract_record(function, index)?;
        // Keep recorded run ids; `push` would renumber.
        container.records.push(record);
    }
    Ok(container)
}

/// One `function` node into an [`InvocationRecord`].
pub fn extract_record(node: &Node, index: usize) -> Result<InvocationRecord, ReconstructionError> {
    let fallback_context = format!("function #{}", index + 1);
    let function_name = required_text(node, &fallback_context, "function_name")?;
    let raw_run_id = required_text(node, &fallback_context, "run_id")?;
    let context = format!("function `{function_name}` run {}", raw_run_id.trim());

    let run_id = raw_run_id
        .trim()
        .parse::<u64>()
        .map_err(|_| ReconstructionError::InvalidField {
            context: context.clone(),
            field: "run_id".to_string(),
            value: raw_run_id.clone(),
        })?;

    let arguments = required_list(node, &context, "arguments_list")?
        .iter()
        .map(|item| extract_value(item, &context))
        .collect::<Result<Vec<_>, _>>()?;
    let results = required_list(node, &context, "results_list")?
        .iter()
        .map(|item| extract_value(item, &context))
        .collect::<Result<Vec<_>, _>>()?;

    let additional_info = results
        .iter()
        .map(|r| r.note.as_str())
        .find(|note| !note.is_empty())
        .unwrap_or_default()
        .to_string();

    Ok(InvocationRecord {
        run_id,
        scope_path: required_text(node, &context, "scope_name")?,
        class_name: required_text(node, &context, "class_name")?,
        class_snapshot: required_text(node, &context, "class_dump")?,
        function_name,
        call_stack: required_text(node, &context, "call_stack")?,
        arguments,
        results,
        additional_info,
    })
}

fn extract_value(node: &Node, record_context: &str) -> Result<ValueSnapshot, ReconstructionError> {
    let name = required_text(node, record_context, "par_name")?;
    let context = format!("{record_context}, {} `{name}`", node.tag);

    let raw_state = required_text(node, &context, "par_state")?;
    let role = ValueRole::parse(&raw_state).ok_or_else(|| ReconstructionError::InvalidField {
        context: context.clone(),
        field: "par_state".to_string(),
        value: raw_state.clone(),
    })?;

    let raw_simple = required_text(node, &context, "par_simple")?;
    let is_primitive = parse_flag(&raw_simple).ok_or_else(|| ReconstructionError::InvalidField {
        context: context.clone(),
        field: "par_simple".to_string(),
        value: raw_simple.clone(),
    })?;

    Ok(ValueSnapshot {
        type_tag: required_text(node, &context, "par_type")?,
        value: required_text(node, &context, "par_value")?,
        note: node.child_text("additional_info").unwrap_or_default().to_string(),
        name,
        is_primitive,
        role,
    })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn required_text(node: &Node, context: &str, field: &str) -> Result<String, ReconstructionError> {
    node.child_text(field)
        .map(str::to_string)
        .ok_or_else(|| ReconstructionError::MissingField {
            context: context.to_string(),
            field: field.to_string(),
        })
}

fn required_list<'a>(
    node: &'a Node,
    context: &str,
    field: &str,
) -> Result<&'a [Node], ReconstructionError> {
    let child = node
        .child(field)
        .ok_or_else(|| ReconstructionError::MissingField {
            context: context.to_string(),
            field: field.to_string(),
        })?;
    if !child.is_list() {
        return Err(ReconstructionError::NotAList {
            context: context.to_string(),
            field: field.to_string(),
        });
    }
    Ok(child.items())
}
