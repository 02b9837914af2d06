//! Tipos de erro para o cliente do relay de e-mail.
//!
//! Define [`DeliveryError`] com variantes para rate limiting, erros da API
//! e erros de rede. Usa `thiserror` para derivar `Display` e `Error`
//! automaticamente a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao entregar uma mensagem ao relay.
///
/// Qualquer variante faz o lote inteiro ser tratado como falha de entrega.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// O relay retornou HTTP 429 e as retentativas se esgotaram.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Erro retornado pelo relay (ex.: 401 chave inválida, 500 erro interno).
    #[error("relay error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Nenhum destinatário configurado.
    #[error("no recipients configured")]
    NoRecipients,
}
