//! Generators for each supported policy kind.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod client_settings;
pub mod observability;


pub use self::{
    client_settings::ClientSettingsGenerator, observability::ObservabilityGenerator,
};
use gateway_controller_core::policies::CompositeGenerator;
use minijinja::{AutoEscape, Environment};

/// Returns a generator covering every supported policy kind.
///
/// Observability is registered last, so its inline settings take precedence
/// should another kind ever set the same directive.
pub fn default_generator() -> CompositeGenerator {
    CompositeGenerator::default()
        .with(ClientSettingsGenerator::new())
        .with(ObservabilityGenerator::new())
}

/// Builds a template environment from fixed templates.
///
/// # Panics
///
/// Panics if a template fails to compile. Templates are compiled into the
/// binary, so this is a build defect rather than a runtime condition.
fn environment(templates: &[(&'static str, &'static str)]) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.set_keep_trailing_newline(true);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.add_filter("quote", quote);
    for (name, source) in templates {
        if let Err(error) = env.add_template(name, source) {
            panic!("template {name} must compile: {error}");
        }
    }
    env
}

/// Renders a fixed template.
///
/// # Panics
///
/// Panics if rendering fails, which only happens if the template itself is
/// broken.
fn render<S: serde::Serialize>(env: &Environment<'static>, name: &str, ctx: S) -> Vec<u8> {
    match env.get_template(name).and_then(|t| t.render(ctx)) {
        Ok(content) => content.into_bytes(),
        Err(error) => panic!("template {name} must render: {error}"),
    }
}

/// Quotes a value as an nginx string literal.
fn quote(value: String) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
