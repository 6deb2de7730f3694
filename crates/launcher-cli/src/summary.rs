use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use launcher_core::steps::extract::find_executable;
use launcher_core::{CurrentState, LauncherContext, LauncherError, version};

/// Facts shown by `launcher status`.
pub struct StatusReport {
    pub state: Result<CurrentState, LauncherError>,
    pub installed: Vec<String>,
}

pub fn print_status(ctx: &LauncherContext, report: &StatusReport) {
    let paths = &ctx.paths;
    let current_dir = report
        .state
        .as_ref()
        .ok()
        .and_then(|state| version::version_to_dirname(&state.version).ok());

    let mut table = Table::new();
    table.set_header(vec![header_cell("Setting"), header_cell("Value")]);
    apply_table_style(&mut table);
    table.add_row(vec![
        Cell::new("Base directory"),
        Cell::new(paths.base_dir.display()),
    ]);
    match &report.state {
        Ok(state) => {
            table.add_row(vec![Cell::new("Program"), Cell::new(&state.program_id)]);
            table.add_row(vec![
                Cell::new("Version"),
                Cell::new(&state.version).add_attribute(Attribute::Bold),
            ]);
            table.add_row(vec![Cell::new("Server"), Cell::new(&state.server_url)]);
        }
        Err(error) => {
            table.add_row(vec![
                Cell::new("State"),
                Cell::new(error).fg(Color::Red),
            ]);
        }
    }
    let exe = current_dir
        .as_deref()
        .and_then(|dir| find_executable(&paths.version_dir(dir), &ctx.settings.exe_name));
    table.add_row(vec![
        Cell::new("Executable"),
        match exe {
            Some(path) => Cell::new(path.display()),
            None => Cell::new(format!("{} not found", ctx.settings.exe_name)).fg(Color::Red),
        },
    ]);
    match ctx.support() {
        Some(support) => {
            table.add_row(vec![Cell::new("Support site"), Cell::new(support.site_url)]);
            table.add_row(vec![Cell::new("Q&A"), Cell::new(support.qna_url)]);
        }
        None => {
            table.add_row(vec![Cell::new("Support"), dim_cell("not configured")]);
        }
    }
    println!("{table}");

    if report.installed.is_empty() {
        println!("No versions installed.");
        return;
    }

    let mut versions = Table::new();
    versions.set_header(vec![header_cell("Installed"), header_cell("Current")]);
    apply_table_style(&mut versions);
    if let Some(column) = versions.column_mut(1) {
        column.set_cell_alignment(CellAlignment::Center);
    }
    for dirname in &report.installed {
        let is_current = current_dir.as_deref() == Some(dirname.as_str());
        versions.add_row(vec![
            Cell::new(dirname),
            if is_current {
                Cell::new("*").fg(Color::Green).add_attribute(Attribute::Bold)
            } else {
                dim_cell("")
            },
        ]);
    }
    println!();
    println!("{versions}");
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
