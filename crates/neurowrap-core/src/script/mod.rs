//! Script assembly for the scripted statistical package
//!
//! Scripts are built as an ordered list of statements and joined exactly once
//! when the body is needed. Nothing here interprets the statements.

pub mod matlab;

/// First line of every generated script
pub const HEADER: &str = "% generated by neurowrap";

/// Ordered statement list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptBuilder {
    statements: Vec<String>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder starting with the standard header and `spm_defaults;`
    pub fn with_header() -> Self {
        let mut builder = Self::new();
        builder.push(HEADER).push("spm_defaults;");
        builder
    }

    pub fn push(&mut self, statement: impl Into<String>) -> &mut Self {
        self.statements.push(statement.into());
        self
    }

    pub fn extend<I, S>(&mut self, statements: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.statements.extend(statements.into_iter().map(Into::into));
        self
    }

    /// `% text`
    pub fn comment(&mut self, text: &str) -> &mut Self {
        self.push(format!("% {}", text))
    }

    pub fn blank(&mut self) -> &mut Self {
        self.push("")
    }

    /// Convert a job list for the older package release, then run it
    pub fn run_jobs(&mut self) -> &mut Self {
        self.push("if strcmp(spm('ver'),'SPM8'), spm_jobman('initcfg');jobs=spm_jobman('spm5tospm8',{jobs});end")
            .push("spm_jobman('run',jobs);")
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn finish(self) -> Vec<String> {
        self.statements
    }
}

/// Join statements into a script body, one per line
pub fn join(statements: &[String]) -> String {
    let mut body = statements.join("\n");
    body.push('\n');
    body
}
