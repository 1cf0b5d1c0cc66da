//! Values and environment-name template rendering.
//!
//! Templates use minijinja syntax. A subset of Go `text/template` is accepted
//! and rewritten before parsing: leading-dot field references
//! (`{{ .Input.DockerImageName }}`), `$name` variables, and the `if`,
//! `else if`, `else`, `range $v := ...`, `range $k, $v := ...` and `end`
//! actions. Bare `{{ . }}`, `with`, and Go function calls such as `printf` or
//! `eq` have no translation and fail to parse.

use crate::request::{DeploymentRequest, ImageRef};
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;
use wheelhouse_schema::TemplateSource;

/// Output file name used when the values template is given inline.
pub const INLINE_VALUES_FILE: &str = "values.yaml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateOrigin {
    Inline(String),
    File(PathBuf),
}

impl fmt::Display for TemplateOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(name) => f.write_str(name),
            Self::File(path) => write!(f, "file specified by values_template.path ({})", path.display()),
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("calling stat on {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} must be a file, but was a directory", path.display())]
    NotAFile { path: PathBuf },
    #[error("parsing {origin}: {source}")]
    Parse {
        origin: TemplateOrigin,
        source: minijinja::Error,
    },
    #[error("executing {origin}: {source}")]
    Render {
        origin: TemplateOrigin,
        source: minijinja::Error,
    },
    #[error("render I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Data exposed to templates as `Input`, `Env`, and `Workspace`.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TemplateContext {
    #[serde(rename = "Input")]
    pub input: BTreeMap<String, String>,
    #[serde(rename = "Env")]
    pub env: BTreeMap<String, String>,
    #[serde(rename = "Workspace")]
    pub workspace: String,
}

impl TemplateContext {
    pub fn from_request(request: &DeploymentRequest) -> Self {
        let mut ctx = Self {
            input: BTreeMap::new(),
            env: request.env.clone(),
            workspace: request.workspace.clone(),
        };
        ctx.populate(&request.input);
        ctx.populate_image(&request.image);
        ctx
    }

    pub fn populate(&mut self, input: &BTreeMap<String, String>) {
        self.input
            .extend(input.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    pub fn populate_image(&mut self, image: &ImageRef) {
        self.input
            .insert("DockerImageName".to_owned(), image.name.clone());
        self.input
            .insert("DockerImageTag".to_owned(), image.tag.clone());
    }
}

/// Scoped temporary directory holding rendered files for one deployment.
///
/// The directory and everything in it is removed when the workspace is dropped.
pub struct RenderWorkspace {
    dir: TempDir,
}

impl RenderWorkspace {
    pub fn new() -> Result<Self, RenderError> {
        let dir = tempfile::Builder::new().prefix("wheelhouse-").tempdir()?;
        debug!("render workspace at {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Render the values template into this workspace and return the written file's path.
    pub fn render_values(
        &self,
        source: &TemplateSource,
        ctx: &TemplateContext,
    ) -> Result<PathBuf, RenderError> {
        match source {
            TemplateSource::File(path) => {
                let meta = fs::metadata(path).map_err(|source| RenderError::Stat {
                    path: path.clone(),
                    source,
                })?;
                if meta.is_dir() {
                    return Err(RenderError::NotAFile { path: path.clone() });
                }

                let file_name = path
                    .file_name()
                    .map_or_else(|| INLINE_VALUES_FILE.into(), |n| n.to_string_lossy());
                let text = fs::read_to_string(path)?;
                let rendered = render_str(
                    &TemplateOrigin::File(path.clone()),
                    &file_name,
                    &text,
                    ctx,
                )?;
                let out = self.dir.path().join(file_name.as_ref());
                fs::write(&out, rendered)?;
                Ok(out)
            }
            TemplateSource::Inline(text) => {
                let rendered = render_inline("values_template.data", text, ctx)?;
                let out = self.dir.path().join(INLINE_VALUES_FILE);
                fs::write(&out, rendered)?;
                Ok(out)
            }
        }
    }

    /// Remove the directory now instead of at drop, reporting any failure.
    pub fn release(self) -> Result<(), RenderError> {
        self.dir.close()?;
        Ok(())
    }
}

/// Render an inline template to a string.
pub fn render_inline(name: &str, template: &str, ctx: &TemplateContext) -> Result<String, RenderError> {
    render_str(&TemplateOrigin::Inline(name.to_owned()), name, template, ctx)
}

fn render_str(
    origin: &TemplateOrigin,
    name: &str,
    template: &str,
    ctx: &TemplateContext,
) -> Result<String, RenderError> {
    let source = normalize_go_syntax(template);

    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_auto_escape_callback(|_| AutoEscape::None);

    env.add_template(name, &source)
        .map_err(|source| RenderError::Parse {
            origin: origin.clone(),
            source,
        })?;
    let tmpl = env.get_template(name).map_err(|source| RenderError::Parse {
        origin: origin.clone(),
        source,
    })?;
    tmpl.render(ctx).map_err(|source| RenderError::Render {
        origin: origin.clone(),
        source,
    })
}

/// Rewrite the supported Go `text/template` constructs into minijinja syntax.
pub fn normalize_go_syntax(template: &str) -> Cow<'_, str> {
    if !template.contains("{{") && !template.contains("{%") {
        return Cow::Borrowed(template);
    }

    let mut out = String::with_capacity(template.len());
    let mut open_blocks = Vec::new();
    let mut rest = template;
    while let Some(start) = find_block_open(rest) {
        out.push_str(&rest[..start]);
        let opener = &rest[start..start + 2];
        let after = &rest[start + 2..];
        let close = if opener == "{{" { "}}" } else { "%}" };
        let end = after.find(close).unwrap_or(after.len());
        let body = strip_go_sigils(&after[..end]);

        let action = if opener == "{{" && end < after.len() {
            go_action(&body, &mut open_blocks)
        } else {
            None
        };
        match action {
            Some(stmt) => {
                out.push_str("{%");
                out.push_str(&stmt);
                out.push_str("%}");
                rest = &after[end + close.len()..];
            }
            None => {
                out.push_str(opener);
                out.push_str(&body);
                rest = &after[end..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn find_block_open(s: &str) -> Option<usize> {
    match (s.find("{{"), s.find("{%")) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Translate a Go control action into the body of a `{% %}` block.
///
/// `open_blocks` tracks which construct each Go `end` closes.
fn go_action(body: &str, open_blocks: &mut Vec<&'static str>) -> Option<String> {
    let (lead, inner) = match body.strip_prefix('-') {
        Some(r) if r.starts_with(char::is_whitespace) => ("-", r),
        _ => ("", body),
    };
    let (inner, trail) = match inner.strip_suffix('-') {
        Some(r) if r.ends_with(char::is_whitespace) => (r, "-"),
        _ => (inner, ""),
    };
    let inner = inner.trim();

    let stmt = if inner == "end" {
        format!("end{}", open_blocks.pop()?)
    } else if inner == "else" {
        if open_blocks.is_empty() {
            return None;
        }
        "else".to_owned()
    } else if let Some(cond) = inner.strip_prefix("else if ") {
        if open_blocks.last() != Some(&"if") {
            return None;
        }
        format!("elif {}", cond.trim())
    } else if let Some(cond) = inner.strip_prefix("if ") {
        open_blocks.push("if");
        format!("if {}", cond.trim())
    } else if let Some(clause) = inner.strip_prefix("range ") {
        let (vars, expr) = clause.split_once(":=")?;
        let (vars, expr) = (vars.trim(), expr.trim());
        open_blocks.push("for");
        if vars.contains(',') {
            format!("for {vars} in {expr}|items")
        } else {
            format!("for {vars} in {expr}")
        }
    } else {
        return None;
    };
    Some(format!("{lead} {stmt} {trail}"))
}

/// Drop the leading `.` of field references and the `$` of variables.
fn strip_go_sigils(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len());
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut chars = expr.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == q && prev != Some('\\') {
                quote = None;
            }
            prev = Some(c);
            continue;
        }

        let starts_name = chars.peek().is_some_and(|n| n.is_alphabetic() || *n == '_');
        if c == '"' || c == '\'' {
            quote = Some(c);
        } else if (c == '.'
            && prev.map_or(true, |p| p.is_whitespace() || "([{,|-=!<>+*/%~:".contains(p))
            && starts_name)
            || (c == '$' && starts_name)
        {
            prev = Some(c);
            continue;
        }
        out.push(c);
        prev = Some(c);
    }
    out
}
