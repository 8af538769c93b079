//! Configuração do gradefix carregada a partir de `gradefix.toml`.
//!
//! A struct [`GradeFixConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! Precedência: arquivo → conexão salva via `gradefix settings set` →
//! variáveis de ambiente `GRADEFIX_API_KEY` / `GRADEFIX_PROJECT_ID`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::local::{LocalStorage, REMOTE_SETTINGS_KEY};
use crate::sync::{DEFAULT_POLL_INTERVAL, DEFAULT_RECONCILE_DELAY};

pub const CONFIG_FILE: &str = "gradefix.toml";

/// Configuração de nível superior carregada de `gradefix.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct GradeFixConfig {
    /// Chave de API do projeto Firebase.
    #[serde(default)]
    pub api_key: String,

    /// Identificador do projeto Firebase.
    #[serde(default)]
    pub project_id: String,

    /// Coleção Firestore que guarda os registros.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Diretório do armazenamento local (cache e senhas).
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Intervalo da sincronização periódica, em segundos.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Atraso da sincronização de confirmação após uma escrita, em milissegundos.
    #[serde(default = "default_reconcile_delay_ms")]
    pub reconcile_delay_ms: u64,

    /// Timeout total de cada requisição HTTP, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_collection() -> String {
    "student_entries".to_string()
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_reconcile_delay_ms() -> u64 {
    DEFAULT_RECONCILE_DELAY.as_millis() as u64
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for GradeFixConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            project_id: String::new(),
            collection: default_collection(),
            data_dir: None,
            poll_interval_secs: default_poll_interval_secs(),
            reconcile_delay_ms: default_reconcile_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Conexão remota salva no armazenamento local (`settings set`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSettings {
    pub api_key: String,
    pub project_id: String,
}

impl RemoteSettings {
    /// Exige `api_key` e `project_id` não vazios.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() || self.project_id.trim().is_empty() {
            anyhow::bail!("incomplete settings: both api key and project id are required");
        }
        Ok(())
    }
}

impl GradeFixConfig {
    /// Carrega a configuração de `gradefix.toml` no diretório atual e aplica
    /// as camadas seguintes.
    pub fn load() -> Result<Self> {
        let mut config = Self::from_file(Path::new(CONFIG_FILE))?;

        let storage = config.storage();
        match storage.get::<RemoteSettings>(REMOTE_SETTINGS_KEY) {
            Ok(Some(remote)) => config.apply_remote(&remote),
            Ok(None) => {}
            Err(err) => tracing::warn!(%err, "Stored remote settings unreadable, ignoring"),
        }

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Lê o arquivo; usa valores padrão se ele não existir.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str::<GradeFixConfig>(&contents)?)
    }

    pub fn apply_remote(&mut self, remote: &RemoteSettings) {
        self.api_key = remote.api_key.clone();
        self.project_id = remote.project_id.clone();
    }

    /// Variável de ambiente tem precedência sobre o arquivo e a conexão salva.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("GRADEFIX_API_KEY")
            && !key.is_empty()
        {
            self.api_key = key;
        }
        if let Some(project) = var("GRADEFIX_PROJECT_ID")
            && !project.is_empty()
        {
            self.project_id = project;
        }
    }

    /// O endpoint remoto só está configurado com chave e projeto.
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.project_id.trim().is_empty()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("gradefix")
        })
    }

    pub fn storage(&self) -> LocalStorage {
        LocalStorage::new(self.data_dir())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn reconcile_delay(&self) -> Duration {
        Duration::from_millis(self.reconcile_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
