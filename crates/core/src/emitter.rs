use crate::planner::{PlanEntry, RenamePlan};
use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Renders one run as shell lines: a header comment, then each entry.
pub fn render_plan(plan: &RenamePlan) -> String {
    let mut out = String::new();
    push_comment(
        &mut out,
        &format!("入力: {} ({})", plan.input.display(), plan.kind.label()),
    );
    for entry in &plan.entries {
        render_entry(entry, &mut out);
    }
    out
}

pub fn render_entry(entry: &PlanEntry, out: &mut String) {
    match entry {
        PlanEntry::Move {
            source,
            destination,
            sidecar_source,
            sidecar_destination,
        } => {
            push_move(out, source, destination);
            push_move(out, sidecar_source, sidecar_destination);
        }
        PlanEntry::MoveNoSidecar {
            source,
            destination,
        } => {
            push_move(out, source, destination);
            push_comment(out, &format!("サイドカーなし: {}", source.display()));
        }
        PlanEntry::Unresolved { source, reason } => {
            push_comment(out, &format!("未解決: {} ({})", source.display(), reason));
        }
    }
}

/// Appends the run to `plan_file` in a single write. Earlier runs are kept.
pub fn append_plan(plan_file: &Path, plan: &RenamePlan) -> Result<usize> {
    let body = render_plan(plan);

    if let Some(parent) = plan_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| {
            format!(
                "計画ファイルのフォルダを作成できませんでした: {}",
                parent.display()
            )
        })?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(plan_file)
        .with_context(|| format!("計画ファイルを開けませんでした: {}", plan_file.display()))?;
    file.write_all(body.as_bytes())
        .and_then(|_| file.flush())
        .with_context(|| format!("計画ファイルに書き込めませんでした: {}", plan_file.display()))?;

    Ok(body.lines().count())
}

fn push_move(out: &mut String, from: &Path, to: &Path) {
    out.push_str(&format!("mv {} {}\n", shell_quote(from), shell_quote(to)));
}

fn push_comment(out: &mut String, text: &str) {
    out.push_str(&format!("# {}\n", text.replace('\n', "\\n")));
}

fn shell_quote(path: &Path) -> String {
    let text = path.to_string_lossy();
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for ch in text.chars() {
        if matches!(ch, '\\' | '"' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}
