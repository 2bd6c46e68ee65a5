pub mod check;
pub mod sync;

#[derive(Debug, Clone)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    /// Write the report to the log stream.
    pub fn emit(&self) {
        for line in &self.details {
            tracing::info!(command = %self.command, "{line}");
        }
        for line in &self.issues {
            tracing::error!(command = %self.command, "{line}");
        }
    }
}
