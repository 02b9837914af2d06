//! Configuração do reportrelay carregada a partir de `reportrelay.toml`.
//!
//! A struct [`RelayConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `REPORTRELAY_MAIL_API_KEY` tem precedência sobre o arquivo.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Caminho padrão do arquivo de configuração.
pub const DEFAULT_CONFIG_PATH: &str = "reportrelay.toml";

/// Configuração de nível superior carregada de `reportrelay.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Arquivo JSON do record store.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Diretório de entrada monitorado pela ingestão.
    #[serde(default = "default_inbox_dir")]
    pub inbox_dir: PathBuf,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub mail: MailConfig,
}

/// Cadências dos pontos de entrada agendados.
///
/// As expressões cron têm seis campos (segundos primeiro) e usam o horário local.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Cadência da manhã para a entrega primária.
    #[serde(default = "default_morning")]
    pub morning: String,

    /// Cadência diurna para a entrega primária.
    #[serde(default = "default_day")]
    pub day: String,

    /// Agenda também o reenvio nas mesmas cadências. Desligado por padrão.
    #[serde(default)]
    pub retry_enabled: bool,

    /// Intervalo fixo da ingestão em milissegundos.
    #[serde(default = "default_ingest_interval_ms")]
    pub ingest_interval_ms: u64,

    /// Atraso inicial antes da primeira ingestão.
    #[serde(default = "default_ingest_initial_delay_ms")]
    pub ingest_initial_delay_ms: u64,
}

/// Parâmetros do relay de e-mail.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Endpoint HTTP de envio do relay.
    #[serde(default = "default_relay_url")]
    pub relay_url: String,

    /// Chave da API do relay.
    #[serde(default)]
    pub api_key: String,

    /// Remetente das mensagens.
    #[serde(default = "default_sender")]
    pub sender: String,

    /// Destinatários (o cliente).
    #[serde(default)]
    pub recipients: Vec<String>,

    /// Prefixo do assunto; o token de data do dia é anexado.
    #[serde(default = "default_subject")]
    pub subject: String,

    /// Máximo de retentativas quando o relay limita a taxa.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Atraso base em milissegundos para backoff exponencial.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("reportrelay-store.json")
}

fn default_inbox_dir() -> PathBuf {
    PathBuf::from("inbox")
}

// 07:00 todos os dias.
fn default_morning() -> String {
    "0 0 7 * * *".to_string()
}

// 13:00 todos os dias.
fn default_day() -> String {
    "0 0 13 * * *".to_string()
}

fn default_ingest_interval_ms() -> u64 {
    100_000
}

fn default_ingest_initial_delay_ms() -> u64 {
    1000
}

fn default_relay_url() -> String {
    "http://localhost:8025/api/send".to_string()
}

fn default_sender() -> String {
    "reports@localhost".to_string()
}

fn default_subject() -> String {
    "Daily drilling updates".to_string()
}

// Valor padrão para retentativas máximas: 3.
fn default_max_retries() -> u32 {
    3
}

// Valor padrão para o atraso base: 1000ms.
fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            morning: default_morning(),
            day: default_day(),
            retry_enabled: false,
            ingest_interval_ms: default_ingest_interval_ms(),
            ingest_initial_delay_ms: default_ingest_initial_delay_ms(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            relay_url: default_relay_url(),
            api_key: String::new(),
            sender: default_sender(),
            recipients: Vec::new(),
            subject: default_subject(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            inbox_dir: default_inbox_dir(),
            schedule: ScheduleConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Carrega a configuração do caminho dado.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str::<RelayConfig>(&contents)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo de configuração para a chave API.
        if let Ok(key) = std::env::var("REPORTRELAY_MAIL_API_KEY")
            && !key.is_empty()
        {
            config.mail.api_key = key;
        }

        Ok(config)
    }
}
