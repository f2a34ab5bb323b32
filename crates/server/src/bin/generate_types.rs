//! Writes the TypeScript declarations of every API type to `shared/types.ts`.

use std::{fs, path::PathBuf};

use ts_rs::TS;

fn generate_types_content() -> String {
    let decls: Vec<String> = vec![
        utils::response::ApiResponse::<()>::decl(),
        db::models::project::Project::decl(),
        db::models::project::CreateProject::decl(),
        db::models::project::UpdateProject::decl(),
        db::models::column::Column::decl(),
        db::models::column::CreateColumn::decl(),
        db::models::column::UpdateColumn::decl(),
        db::models::task::TaskPriority::decl(),
        db::models::task::Task::decl(),
        db::models::task::CreateTask::decl(),
        db::models::task::UpdateTask::decl(),
        db::models::task::MoveTask::decl(),
        db::models::calendar_event::CalendarEvent::decl(),
        db::models::calendar_event::CreateCalendarEvent::decl(),
        db::models::calendar_event::UpdateCalendarEvent::decl(),
        db::models::notification::NotificationKind::decl(),
        db::models::notification::Notification::decl(),
        db::models::email_account::EmailProvider::decl(),
        db::models::email_account::EmailAccount::decl(),
        db::models::email_account::CreateEmailAccount::decl(),
        db::models::email::EmailFolder::decl(),
        db::models::email::Email::decl(),
        db::models::email::UpdateEmail::decl(),
        db::models::profile::Profile::decl(),
        db::models::profile::UpdateProfile::decl(),
        services::services::board::Board::decl(),
        services::services::calendar::EventRange::decl(),
        services::services::email::EmailQuery::decl(),
        services::services::email::SendEmail::decl(),
        services::services::email::SyncResult::decl(),
        services::services::email::DeleteOutcome::decl(),
        services::services::email::providers::ProviderPreset::decl(),
        services::services::config::Config::decl(),
        services::services::config::NotificationConfig::decl(),
        services::services::config::CalendarConfig::decl(),
        services::services::config::ThemeMode::decl(),
        services::services::config::WeekStart::decl(),
        server::routes::projects::ReorderColumns::decl(),
        server::routes::notifications::NotificationFeed::decl(),
        server::routes::notifications::MarkAllReadResponse::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|d| {
            let trimmed = d.trim_start();
            if trimmed.starts_with("export") {
                d
            } else {
                format!("export {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "// This file was generated by `generate_types`. Do not edit it by hand.\n\n{body}\n"
    )
}

fn main() -> std::io::Result<()> {
    let check_mode = std::env::args().any(|arg| arg == "--check");
    let shared_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../shared");
    let types_path = shared_path.join("types.ts");
    let generated = generate_types_content();

    if check_mode {
        let current = fs::read_to_string(&types_path).unwrap_or_default();
        if current == generated {
            println!("shared/types.ts is up to date");
            return Ok(());
        }
        eprintln!("shared/types.ts is out of date, run `cargo run --bin generate_types`");
        std::process::exit(1);
    }

    fs::create_dir_all(&shared_path)?;
    fs::write(&types_path, generated)?;
    println!("TypeScript types written to {}", types_path.display());
    Ok(())
}
