use pocketbook_client::ClientError;
use serde_json::Value;

pub fn render_error(error: &ClientError) -> String {
    let mut lines = vec![
        "The command could not finish.".to_string(),
        String::new(),
        format!("  Error:    {}", error.code),
        format!("  Details:  {}", error.message),
    ];

    let issues = error
        .data
        .as_ref()
        .and_then(|data| data.get("issues"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if !issues.is_empty() {
        lines.push(String::new());
        lines.push("Row issues:".to_string());
        for issue in &issues {
            let row = issue.get("row").and_then(Value::as_i64).unwrap_or(0);
            let errors = issue
                .get("errors")
                .and_then(Value::as_array)
                .map(|errors| {
                    errors
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<&str>>()
                        .join("; ")
                })
                .unwrap_or_default();
            if !errors.is_empty() {
                lines.push(format!("  Row {row}: {errors}"));
            }
        }
    }

    lines.push(String::new());
    lines.push("What to do next:".to_string());
    if error.recovery_steps.is_empty() {
        lines.push("  1. Retry the command.".to_string());
    } else {
        for (index, step) in error.recovery_steps.iter().enumerate() {
            lines.push(format!("  {}. {step}", index + 1));
        }
    }

    lines.join("\n")
}
