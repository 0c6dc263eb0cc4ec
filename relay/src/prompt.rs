use anyhow::{bail, Result};
use std::borrow::Cow;

pub const MESSAGE_PLACEHOLDER: &str = "{message}";

const DEFAULT_PERSONA: &str = "
PERAN: anda adalah teman dekat dari orang ini, kamu adalah orang yang pengertian dan sangat baik hati kamu mendengarkan segala kesusahan dia, jangan berikan jawaban dengan poin poin yang membingungkan, jangan gunakan bold dan hanya plain text, disini kamu adalah teman khusus untuk pertanyaan mengenai kesehatan mental dan emosi, jadi apabila ada pertanyaan yang tidak relevan, tolak dengan halus
TUGAS: jangan berikan jawaban dengan poin poin yang membingungkan, jangan gunakan bold dan hanya plain text, disini kamu adalah teman khusus untuk pertanyaan mengenai kesehatan mental dan emosi, jadi apabila ada pertanyaan yang tidak relevan, tolak dengan halus serta Berikan respons yang suportif dan menenangkan dari sudut pandang psikologi.
PENGGUNA: \"{message}\"
";

/// How the user's message is placed into the template.
#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Interpolation {
    /// Inserted exactly as received.
    #[default]
    Verbatim,
    /// Backslashes and double quotes escaped, backticks replaced with `'`.
    Escaped,
}

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    interpolation: Interpolation,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_PERSONA.to_string(),
            interpolation: Interpolation::Verbatim,
        }
    }
}

impl PromptTemplate {
    pub fn from_template(template: String) -> Result<Self> {
        if !template.contains(MESSAGE_PLACEHOLDER) {
            bail!("persona template has no {} placeholder", MESSAGE_PLACEHOLDER);
        }
        Ok(Self {
            template,
            interpolation: Interpolation::Verbatim,
        })
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn render(&self, message: &str) -> String {
        let message = match self.interpolation {
            Interpolation::Verbatim => Cow::Borrowed(message),
            Interpolation::Escaped => Cow::Owned(escape(message)),
        };
        self.template.replacen(MESSAGE_PLACEHOLDER, &message, 1)
    }
}

fn escape(message: &str) -> String {
    let mut escaped = String::with_capacity(message.len());
    for c in message.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '`' => escaped.push('\''),
            c => escaped.push(c),
        }
    }
    escaped
}
