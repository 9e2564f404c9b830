use gabarit_engine::RepairError;
use gabarit_opc::OpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("package error: {0}")]
    Opc(#[from] OpcError),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("placeholder repair error: {0}")]
    Repair(#[from] RepairError),
    #[error("invalid document: {0}")]
    Invalid(String),
}
