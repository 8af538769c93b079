//! Interface de linha de comando do gradefix baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] e flags globais
//! (--user, --password, --verbose).

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

use crate::entry::{Grade, Status};
use crate::report::Scope;

/// gradefix: acompanhamento da correção de notas 0, ร e มส.
#[derive(Debug, Parser)]
#[command(name = "gradefix", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Usuário da sessão.
    #[arg(long, short, global = true, env = "GRADEFIX_USER")]
    pub user: Option<String>,

    /// Senha da sessão.
    #[arg(long, global = true, env = "GRADEFIX_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Filtro de status aceito pela CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Pending,
    Resolved,
    Recorded,
}

impl From<StatusArg> for Status {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => Status::Pending,
            StatusArg::Resolved => Status::TeacherResolved,
            StatusArg::Recorded => Status::AdminRecorded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    /// Todos os registros.
    All,
    /// Apenas os registros do usuário.
    Mine,
}

impl From<ScopeArg> for Scope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::All => Scope::All,
            ScopeArg::Mine => Scope::Mine,
        }
    }
}

/// Aceita `0`, `ร`, `มส` e os apelidos ASCII `r` e `ms`.
pub fn parse_grade(s: &str) -> Result<Grade, String> {
    match s.trim().to_lowercase().as_str() {
        "r" => Ok(Grade::Withheld),
        "ms" => Ok(Grade::Incomplete),
        other => Grade::parse(other).ok_or_else(|| format!("unknown grade '{s}' (use 0, ร or มส)")),
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Lista os registros visíveis para o usuário.
    List {
        /// Busca por nome, código do aluno ou disciplina.
        #[arg(long)]
        search: Option<String>,

        #[arg(long, value_enum)]
        status: Option<StatusArg>,

        /// Usa apenas o cache local, sem acessar o servidor.
        #[arg(long, default_value_t = false)]
        cached: bool,
    },

    /// Mostra o painel de estatísticas.
    Stats {
        #[arg(long, value_enum, default_value_t = ScopeArg::All)]
        scope: ScopeArg,
    },

    /// Registra uma nota reprovada (status PENDING).
    Add {
        #[arg(long)]
        student_id: String,

        #[arg(long)]
        student_name: String,

        #[arg(long)]
        subject: String,

        #[arg(long, default_value = "")]
        subject_code: String,

        #[arg(long, value_parser = parse_grade, default_value = "0")]
        grade: Grade,

        #[arg(long, default_value = "1")]
        term: String,

        /// Ano letivo (era budista). Padrão: ano atual.
        #[arg(long)]
        year: Option<String>,
    },

    /// Edita os dados descritivos de um registro.
    Edit {
        id: String,

        #[arg(long)]
        student_id: Option<String>,

        #[arg(long)]
        student_name: Option<String>,

        #[arg(long)]
        subject: Option<String>,

        #[arg(long)]
        subject_code: Option<String>,

        #[arg(long, value_parser = parse_grade)]
        grade: Option<Grade>,

        #[arg(long)]
        term: Option<String>,

        #[arg(long)]
        year: Option<String>,
    },

    /// Informa a correção feita pelo professor.
    Resolve {
        id: String,

        /// Nova nota obtida.
        #[arg(long)]
        new_grade: Option<String>,

        /// Data da correção (AAAA-MM-DD). Padrão: hoje.
        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        note: Option<String>,
    },

    /// Confirma o lançamento no sistema oficial (administração).
    Record { id: String },

    /// Remove (soft delete) um registro ainda não lançado.
    Delete {
        id: String,

        /// Confirma sem perguntar.
        #[arg(long, short, default_value_t = false)]
        yes: bool,
    },

    /// Exporta a lista filtrada em CSV.
    Export {
        /// Arquivo de saída. Padrão: grade_fix_data_AAAA-MM-DD.csv
        #[arg(long, short)]
        output: Option<PathBuf>,

        #[arg(long)]
        search: Option<String>,

        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },

    /// Importa registros de uma tabela (TSV ou CSV) no formato do modelo.
    Import { file: PathBuf },

    /// Mantém a lista sincronizada; Enter força uma atualização.
    Watch,

    /// Lista as contas de usuário.
    Users,

    /// Troca a senha do usuário da sessão.
    Passwd {
        #[arg(long)]
        old: String,

        #[arg(long)]
        new: String,

        #[arg(long)]
        confirm: String,
    },

    /// Gerencia a conexão com o Firestore.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Salva chave de API e projeto no armazenamento local.
    Set {
        #[arg(long)]
        api_key: String,

        #[arg(long)]
        project_id: String,
    },
    /// Mostra a configuração efetiva.
    Show,
    /// Remove a conexão salva.
    Clear,
}
