//! Tipos de dados para requisições e respostas do relay de e-mail.
//!
//! Todas as structs derivam `Serialize` e `Deserialize` para conversão JSON
//! conforme o formato esperado pelo endpoint de envio do relay.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::convert::PdfAttachment;

/// Corpo da requisição de envio: uma única mensagem com vários anexos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    /// Endereço do remetente.
    pub from: String,
    /// Destinatários da mensagem.
    pub to: Vec<String>,
    /// Assunto da mensagem.
    pub subject: String,
    /// Corpo em texto simples.
    pub text: String,
    /// Anexos PDF codificados em base64.
    pub attachments: Vec<MailAttachment>,
}

/// Um anexo da mensagem.
///
/// O campo `content_type` é serializado como `"type"` no JSON via `serde(rename)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailAttachment {
    /// Nome do arquivo exibido ao destinatário.
    pub filename: String,
    /// Tipo MIME. Serializado como "type" no JSON.
    #[serde(rename = "type")]
    pub content_type: String,
    /// Conteúdo do arquivo em base64.
    pub content: String,
}

impl MailAttachment {
    /// Codifica um PDF renderizado como anexo.
    pub fn from_pdf(pdf: &PdfAttachment) -> Self {
        Self {
            filename: pdf.file_name.clone(),
            content_type: "application/pdf".to_string(),
            content: STANDARD.encode(&pdf.bytes),
        }
    }
}

/// Resposta do relay após aceitar a mensagem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResponse {
    /// Identificador da mensagem atribuído pelo relay.
    #[serde(default)]
    pub id: String,
}
