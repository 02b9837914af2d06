//! Interface de linha de comando do reportrelay baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (serve, send, resend,
//! receive, status) e flags globais (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::DEFAULT_CONFIG_PATH;

/// reportrelay: converte atualizações de perfuração em PDF e as envia por e-mail.
#[derive(Debug, Parser)]
#[command(name = "reportrelay", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inicia o agendador e roda até Ctrl-C.
    Serve,

    /// Executa a entrega primária uma vez.
    Send,

    /// Executa o reenvio dos itens com erro de envio uma vez.
    Resend,

    /// Executa a ingestão da caixa de entrada uma vez.
    Receive,

    /// Mostra a contagem de itens por situação.
    Status,
}
