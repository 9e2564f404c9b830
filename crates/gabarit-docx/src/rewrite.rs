//! Streaming rewrite of `word/document.xml`.
//!
//! Walks the document with the same paragraph/run traversal as the scan,
//! so block and run indexes line up with the plans, and copies every event
//! it has no edit for unchanged. Edits are spliced in place: run text
//! replacement keeps the run's properties, collapsed blocks keep their
//! first run and drop the rest, struck runs get `<w:strike/>` in their
//! run properties.

use gabarit_engine::{escape_xml_text, BlockEdit};
use gabarit_model::Block;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::fill::BlockPlan;
use crate::DocxError;

#[derive(Debug, Default, Clone)]
struct RunAction {
    replace: Option<String>,
    drop: bool,
    strike: bool,
}

#[derive(Debug, Default)]
struct BlockActions {
    runs: Vec<RunAction>,
    /// Text for a run injected into a block that has no runs to edit.
    append_text: Option<String>,
}

#[derive(Debug)]
struct RunState {
    replace: Option<String>,
    strike: bool,
    text_written: bool,
    rpr_done: bool,
    in_rpr: bool,
    strike_seen: bool,
}

impl RunState {
    fn new(action: &RunAction) -> Self {
        Self {
            replace: action.replace.clone(),
            strike: action.strike,
            text_written: false,
            rpr_done: false,
            in_rpr: false,
            strike_seen: false,
        }
    }
}

struct ParaCtx {
    block: usize,
    next_run: usize,
    run: Option<RunState>,
}

fn build_actions(blocks: &[Block], plans: &[BlockPlan]) -> Vec<BlockActions> {
    blocks
        .iter()
        .zip(plans)
        .map(|(block, plan)| {
            let mut actions = BlockActions {
                runs: vec![RunAction::default(); block.runs.len()],
                append_text: None,
            };
            match &plan.edit {
                BlockEdit::Unchanged => {}
                BlockEdit::Spans(edits) => {
                    for (idx, text) in edits {
                        if let Some(action) = actions.runs.get_mut(*idx) {
                            action.replace = Some(text.clone());
                        }
                    }
                }
                BlockEdit::Collapse(text) => {
                    if actions.runs.is_empty() {
                        actions.append_text = Some(text.clone());
                    } else {
                        actions.runs[0].replace = Some(text.clone());
                        for action in &mut actions.runs[1..] {
                            action.drop = true;
                        }
                    }
                }
            }
            for idx in &plan.strike_runs {
                if let Some(action) = actions.runs.get_mut(*idx) {
                    if !action.drop {
                        action.strike = true;
                    }
                }
            }
            actions
        })
        .collect()
}

/// Apply per-block plans to document XML and return the rewritten bytes.
pub fn apply_plans(xml: &[u8], blocks: &[Block], plans: &[BlockPlan]) -> Result<Vec<u8>, DocxError> {
    let actions = build_actions(blocks, plans);
    let noop = BlockActions::default();

    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::new());

    let mut stack: Vec<ParaCtx> = Vec::new();
    let mut next_block = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => {
                    let block = next_block;
                    next_block += 1;
                    stack.push(ParaCtx {
                        block,
                        next_run: 0,
                        run: None,
                    });
                    writer.write_event(Event::Start(e.to_owned()))?;
                }
                b"w:r" if stack.last().is_some_and(|ctx| ctx.run.is_none()) => {
                    let ctx = stack.last_mut().ok_or_else(|| {
                        DocxError::Invalid("run outside paragraph".into())
                    })?;
                    let block_actions = actions.get(ctx.block).unwrap_or(&noop);
                    let action = block_actions
                        .runs
                        .get(ctx.next_run)
                        .cloned()
                        .unwrap_or_default();
                    ctx.next_run += 1;
                    if action.drop {
                        next_block += skip_subtree(&mut reader)?;
                    } else {
                        ctx.run = Some(RunState::new(&action));
                        writer.write_event(Event::Start(e.to_owned()))?;
                    }
                }
                b"w:rPr"
                    if stack
                        .last()
                        .and_then(|ctx| ctx.run.as_ref())
                        .is_some_and(|run| !run.rpr_done && !run.in_rpr) =>
                {
                    if let Some(run) = stack.last_mut().and_then(|ctx| ctx.run.as_mut()) {
                        run.in_rpr = true;
                    }
                    writer.write_event(Event::Start(e.to_owned()))?;
                }
                b"w:strike"
                    if stack
                        .last()
                        .and_then(|ctx| ctx.run.as_ref())
                        .is_some_and(|run| run.in_rpr && run.strike) =>
                {
                    // Replace whatever strike toggle the template had with
                    // an unconditional one.
                    skip_subtree(&mut reader)?;
                    writer.write_event(Event::Empty(BytesStart::new("w:strike")))?;
                    if let Some(run) = stack.last_mut().and_then(|ctx| ctx.run.as_mut()) {
                        run.strike_seen = true;
                    }
                }
                b"w:t" if active_run(&stack) => {
                    ensure_rpr(&mut writer, &mut stack)?;
                    let run = stack
                        .last_mut()
                        .and_then(|ctx| ctx.run.as_mut())
                        .ok_or_else(|| DocxError::Invalid("text outside run".into()))?;
                    if run.replace.is_some() {
                        if !run.text_written {
                            let text = run.replace.clone().unwrap_or_default();
                            run.text_written = true;
                            write_run_text(&mut writer, &text)?;
                        }
                        skip_subtree(&mut reader)?;
                    } else {
                        writer.write_event(Event::Start(e.to_owned()))?;
                    }
                }
                _ => {
                    if active_run(&stack) && !in_rpr(&stack) {
                        ensure_rpr(&mut writer, &mut stack)?;
                    }
                    writer.write_event(Event::Start(e.to_owned()))?;
                }
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:p" => {
                    let block = next_block;
                    next_block += 1;
                    let block_actions = actions.get(block).unwrap_or(&noop);
                    if let Some(text) = &block_actions.append_text {
                        writer.write_event(Event::Start(e.to_owned()))?;
                        write_injected_run(&mut writer, text, false)?;
                        writer.write_event(Event::End(BytesEnd::new("w:p")))?;
                    } else {
                        writer.write_event(Event::Empty(e.to_owned()))?;
                    }
                }
                b"w:r" if stack.last().is_some_and(|ctx| ctx.run.is_none()) => {
                    let ctx = stack.last_mut().ok_or_else(|| {
                        DocxError::Invalid("run outside paragraph".into())
                    })?;
                    let block_actions = actions.get(ctx.block).unwrap_or(&noop);
                    let action = block_actions
                        .runs
                        .get(ctx.next_run)
                        .cloned()
                        .unwrap_or_default();
                    ctx.next_run += 1;
                    if action.drop {
                        // dropped: write nothing
                    } else if action.replace.is_some() || action.strike {
                        writer.write_event(Event::Start(e.to_owned()))?;
                        if action.strike {
                            raw(&mut writer, "<w:rPr><w:strike/></w:rPr>");
                        }
                        if let Some(text) = &action.replace {
                            write_run_text(&mut writer, text)?;
                        }
                        writer.write_event(Event::End(BytesEnd::new("w:r")))?;
                    } else {
                        writer.write_event(Event::Empty(e.to_owned()))?;
                    }
                }
                b"w:strike"
                    if stack
                        .last()
                        .and_then(|ctx| ctx.run.as_ref())
                        .is_some_and(|run| run.in_rpr && run.strike) =>
                {
                    writer.write_event(Event::Empty(BytesStart::new("w:strike")))?;
                    if let Some(run) = stack.last_mut().and_then(|ctx| ctx.run.as_mut()) {
                        run.strike_seen = true;
                    }
                }
                b"w:t" if active_run(&stack) => {
                    ensure_rpr(&mut writer, &mut stack)?;
                    let run = stack
                        .last_mut()
                        .and_then(|ctx| ctx.run.as_mut())
                        .ok_or_else(|| DocxError::Invalid("text outside run".into()))?;
                    match run.replace.clone() {
                        Some(text) if !run.text_written => {
                            run.text_written = true;
                            write_run_text(&mut writer, &text)?;
                        }
                        Some(_) => {}
                        None => writer.write_event(Event::Empty(e.to_owned()))?,
                    }
                }
                _ => {
                    if active_run(&stack) && !in_rpr(&stack) {
                        ensure_rpr(&mut writer, &mut stack)?;
                    }
                    writer.write_event(Event::Empty(e.to_owned()))?;
                }
            },
            Event::End(e) => match e.name().as_ref() {
                b"w:p" => {
                    if let Some(ctx) = stack.pop() {
                        let block_actions = actions.get(ctx.block).unwrap_or(&noop);
                        if let Some(text) = &block_actions.append_text {
                            write_injected_run(&mut writer, text, false)?;
                        }
                    }
                    writer.write_event(Event::End(e.to_owned()))?;
                }
                b"w:r" if active_run(&stack) => {
                    ensure_rpr(&mut writer, &mut stack)?;
                    if let Some(run) = stack.last_mut().and_then(|ctx| ctx.run.take()) {
                        if let Some(text) = run.replace {
                            if !run.text_written {
                                write_run_text(&mut writer, &text)?;
                            }
                        }
                    }
                    writer.write_event(Event::End(e.to_owned()))?;
                }
                b"w:rPr" if in_rpr(&stack) => {
                    if let Some(run) = stack.last_mut().and_then(|ctx| ctx.run.as_mut()) {
                        if run.strike && !run.strike_seen {
                            writer.write_event(Event::Empty(BytesStart::new("w:strike")))?;
                            run.strike_seen = true;
                        }
                        run.in_rpr = false;
                        run.rpr_done = true;
                    }
                    writer.write_event(Event::End(e.to_owned()))?;
                }
                _ => writer.write_event(Event::End(e.to_owned()))?,
            },
            Event::Eof => break,
            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

fn active_run(stack: &[ParaCtx]) -> bool {
    stack.last().is_some_and(|ctx| ctx.run.is_some())
}

fn in_rpr(stack: &[ParaCtx]) -> bool {
    stack
        .last()
        .and_then(|ctx| ctx.run.as_ref())
        .is_some_and(|run| run.in_rpr)
}

/// Inject `<w:rPr><w:strike/></w:rPr>` before the first non-property child
/// of a struck run that has no properties of its own.
fn ensure_rpr(writer: &mut Writer<Vec<u8>>, stack: &mut [ParaCtx]) -> Result<(), DocxError> {
    if let Some(run) = stack.last_mut().and_then(|ctx| ctx.run.as_mut()) {
        if run.strike && !run.rpr_done {
            raw(writer, "<w:rPr><w:strike/></w:rPr>");
            run.strike_seen = true;
        }
        run.rpr_done = true;
    }
    Ok(())
}

fn write_run_text(writer: &mut Writer<Vec<u8>>, text: &str) -> Result<(), DocxError> {
    let mut start = BytesStart::new("w:t");
    start.push_attribute(("xml:space", "preserve"));
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new("w:t")))?;
    Ok(())
}

fn write_injected_run(
    writer: &mut Writer<Vec<u8>>,
    text: &str,
    strike: bool,
) -> Result<(), DocxError> {
    let rpr = if strike { "<w:rPr><w:strike/></w:rPr>" } else { "" };
    raw(
        writer,
        &format!(
            "<w:r>{rpr}<w:t xml:space=\"preserve\">{}</w:t></w:r>",
            escape_xml_text(text)
        ),
    );
    Ok(())
}

fn raw(writer: &mut Writer<Vec<u8>>, xml: &str) {
    writer.get_mut().extend_from_slice(xml.as_bytes());
}

/// Consume events up to and including the end tag matching the start tag
/// that was just read. Returns how many paragraphs were skipped so the
/// caller can keep its block counter aligned with the scan.
fn skip_subtree(reader: &mut Reader<&[u8]>) -> Result<usize, DocxError> {
    let mut depth = 1usize;
    let mut skipped_paragraphs = 0usize;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if e.name().as_ref() == b"w:p" {
                    skipped_paragraphs += 1;
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if e.name().as_ref() == b"w:p" {
                    skipped_paragraphs += 1;
                }
            }
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Event::Eof => {
                return Err(DocxError::Invalid("unexpected end of document".into()));
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(skipped_paragraphs)
}
