//! Interface de terminal do gradefix: spinner e saída colorida.
//!
//! Usa as crates `indicatif` para o indicador de carregamento e `console`
//! para estilização com cores. O spinner só aparece em sincronizações em
//! primeiro plano; as de fundo são silenciosas.

use std::time::Duration;

use console::{Style, measure_text_width};
use indicatif::{ProgressBar, ProgressStyle};

use crate::auth::Account;
use crate::entry::{Entry, Status};
use crate::report::Stats;
use crate::sync::{AppState, WriteStatus};

/// Indicador de carregamento para uma sincronização em primeiro plano.
pub struct SyncProgress {
    pb: ProgressBar,
}

impl SyncProgress {
    /// Inicia o spinner com a mensagem fornecida.
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb }
    }

    pub fn finish(self) {
        self.pb.finish_and_clear();
    }
}

/// Estilos compartilhados pela saída do terminal.
pub struct Printer {
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
    bold: Style,
}

impl Default for Printer {
    fn default() -> Self {
        Self {
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
            bold: Style::new().bold(),
        }
    }
}

// Alinha à esquerda considerando a largura exibida (texto tailandês tem marcas combinantes).
fn pad(text: &str, width: usize) -> String {
    let shown = measure_text_width(text);
    format!("{text}{}", " ".repeat(width.saturating_sub(shown)))
}

impl Printer {
    /// Linha de status: sincronizando, offline (vermelho) ou horário da última sincronização.
    pub fn status_line(&self, state: &AppState) {
        if state.loading {
            println!("{}", self.dim.apply_to("● syncing..."));
        } else if state.offline {
            println!(
                "{} {}",
                self.red.apply_to("● offline"),
                self.dim.apply_to("showing locally cached data")
            );
        } else if let Some(at) = state.last_sync {
            println!(
                "{} {}",
                self.green.apply_to("● online"),
                self.dim
                    .apply_to(format!("synced {}", at.format("%Y-%m-%d %H:%M:%S UTC")))
            );
        }
    }

    fn status_style(&self, status: Status) -> &Style {
        match status {
            Status::Pending => &self.yellow,
            Status::TeacherResolved => &self.bold,
            Status::AdminRecorded => &self.green,
            Status::Deleted => &self.red,
        }
    }

    /// Tabela de registros.
    pub fn entries<'a>(&self, entries: impl IntoIterator<Item = &'a Entry>) {
        let headers = ["ID", "STUDENT", "NAME", "SUBJECT", "GRADE", "TERM", "NEW", "STATUS"];
        let rows: Vec<(Status, [String; 8])> = entries
            .into_iter()
            .map(|e| {
                let cells = [
                    e.id.clone(),
                    e.student_id.clone(),
                    e.student_name.clone(),
                    format!("{} {}", e.subject_code, e.subject).trim().to_string(),
                    e.grade.to_string(),
                    format!("{}/{}", e.term, e.academic_year),
                    e.new_grade.clone().unwrap_or_else(|| "-".into()),
                    e.status.label().to_string(),
                ];
                (e.status, cells)
            })
            .collect();

        if rows.is_empty() {
            println!("{}", self.dim.apply_to("No entries."));
            return;
        }

        let mut widths = headers.map(measure_text_width);
        for (_, cells) in &rows {
            for (w, cell) in widths.iter_mut().zip(cells) {
                *w = (*w).max(measure_text_width(cell));
            }
        }

        let header_line: Vec<String> = headers
            .iter()
            .zip(widths)
            .map(|(h, w)| pad(h, w))
            .collect();
        println!("{}", self.bold.apply_to(header_line.join("  ")));

        for (status, cells) in &rows {
            let [front @ .., last] = cells;
            let front: Vec<String> = front.iter().zip(widths).map(|(c, w)| pad(c, w)).collect();
            println!(
                "{}  {}",
                front.join("  "),
                self.status_style(*status).apply_to(last)
            );
        }
    }

    pub fn stats(&self, stats: &Stats) {
        println!("{}", self.bold.apply_to("─── Dashboard ───"));
        println!("  total     {}", stats.total);
        println!("  {}   {}", self.yellow.apply_to("pending"), stats.pending);
        println!("  resolved  {}", stats.resolved);
        println!("  {}  {}", self.green.apply_to("recorded"), stats.recorded);
        println!(
            "  grades    0: {}  ร: {}  มส: {}",
            stats.grades.zero, stats.grades.withheld, stats.grades.incomplete
        );
    }

    pub fn users(&self, accounts: &[Account]) {
        for a in accounts {
            println!("{}  {}  {}", pad(&a.username, 14), pad(&a.role.to_string(), 8), a.name);
        }
    }

    /// Resultado de uma escrita: confirmada (verde) ou mantida localmente (amarelo).
    pub fn write_result(&self, what: &str, status: &WriteStatus) {
        match status {
            WriteStatus::Confirmed => println!("  {} {what}", self.green.apply_to("✓")),
            WriteStatus::Offline(err) => println!(
                "  {} {what} locally; will sync later ({err})",
                self.yellow.apply_to("↻")
            ),
        }
    }

    pub fn success(&self, message: &str) {
        println!("  {} {message}", self.green.apply_to("✓"));
    }

    pub fn failure(&self, message: &str) {
        eprintln!("  {} {message}", self.red.apply_to("✗"));
    }
}
