//! Scan `word/document.xml` into blocks of runs.
//!
//! Every `w:p` becomes one block, in document order, wherever it sits
//! (body, table cell, text box). Paragraphs can nest through text boxes,
//! so the scan keeps a stack; the rewrite pass walks the same way, which
//! keeps block and run indexes aligned between the two.

use gabarit_model::{Block, Run};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::DocxError;

struct ParaScan {
    block: usize,
    in_text: bool,
}

/// Scan document XML into blocks of run texts.
pub fn scan_blocks(xml: &[u8]) -> Result<Vec<Block>, DocxError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut blocks: Vec<Block> = Vec::new();
    let mut stack: Vec<ParaScan> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => {
                    blocks.push(Block::default());
                    stack.push(ParaScan {
                        block: blocks.len() - 1,
                        in_text: false,
                    });
                }
                b"w:r" => {
                    if let Some(ctx) = stack.last() {
                        blocks[ctx.block].runs.push(Run::default());
                    }
                }
                b"w:t" => {
                    if let Some(ctx) = stack.last_mut() {
                        ctx.in_text = true;
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                // <w:p/> is an empty paragraph, <w:r/> an empty run.
                b"w:p" => blocks.push(Block::default()),
                b"w:r" => {
                    if let Some(ctx) = stack.last() {
                        blocks[ctx.block].runs.push(Run::default());
                    }
                }
                _ => {}
            },
            Event::Text(e) => {
                if let Some(ctx) = stack.last() {
                    if ctx.in_text {
                        let text = e.unescape()?;
                        if let Some(run) = blocks[ctx.block].runs.last_mut() {
                            run.text.push_str(&text);
                        }
                    }
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:p" => {
                    stack.pop();
                }
                b"w:t" => {
                    if let Some(ctx) = stack.last_mut() {
                        ctx.in_text = false;
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(blocks)
}
