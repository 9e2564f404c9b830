use gabarit_model::{A1ParseError, RecordError};
use gabarit_opc::OpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XlsxError {
    #[error("package error: {0}")]
    Opc(#[from] OpcError),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid cell reference: {0}")]
    A1(#[from] A1ParseError),
    #[error("payload error: {0}")]
    Record(#[from] RecordError),
    #[error("invalid workbook: {0}")]
    Invalid(String),
}
