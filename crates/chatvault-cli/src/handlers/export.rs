use anyhow::Result;
use chatvault_store::EventFilter;
use std::path::PathBuf;

use crate::args::FormatArg;
use crate::context::CliContext;
use crate::handlers::sessions::resolve_session_id;
use crate::render;

pub fn run(
    ctx: &CliContext,
    session_arg: &str,
    format: FormatArg,
    output: Option<PathBuf>,
) -> Result<()> {
    let archive = ctx.open_archive()?;
    let session_id = resolve_session_id(&archive, session_arg)?;

    let rendered = match format {
        FormatArg::Jsonl => archive.export_session_jsonl(&session_id)?,
        _ => {
            let session = archive.get_session(&session_id)?;
            let stats = archive.session_stats(&session_id)?;
            let events = archive.session_events(&session_id, &EventFilter::default())?;
            match format {
                FormatArg::Json => render::to_json(session.as_ref(), &stats, &events),
                FormatArg::Markdown => {
                    render::to_markdown(&session_id, session.as_ref(), &stats, &events)
                }
                FormatArg::Text => render::to_text(&session_id, &stats, &events),
                FormatArg::Csv => render::to_csv(&events),
                FormatArg::Jsonl => unreachable!(),
            }
        }
    };

    match output {
        Some(path) => {
            std::fs::write(&path, rendered)?;
            println!("Wrote {}", path.display());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}
