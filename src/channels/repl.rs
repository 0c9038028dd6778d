//! Terminal front end for the canvas wizard.
//!
//! Uses rustyline for line editing, history and slash-command completion,
//! and termimad to render each step as markdown.
//!
//! ## Commands
//!
//! - `/help` - Show available commands
//! - `/back` / `/forward` - Move between steps without refetching
//! - `/reset` - Start over from keyword entry
//! - `/export` - Write the finished canvas to `<name>_lean_canvas.json`
//! - `/state` - Dump the raw workflow state
//! - `/quit` or `/exit` - Leave the wizard
//!
//! Anything else is input for the current step: the keyword, a record id
//! on the selection steps, or one product detail field at a time.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use rustyline::completion::Completer;
use rustyline::config::Config;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Editor, Helper};
use termimad::MadSkin;

use crate::config::WorkflowConfig;
use crate::domain::{ProductDetails, TaskKind};
use crate::error::WorkflowError;
use crate::llm::UpstreamGateway;
use crate::workflow::{Step, Workflow, WorkflowState};

/// Slash commands available in the wizard.
const SLASH_COMMANDS: &[&str] = &[
    "/help", "/back", "/forward", "/reset", "/export", "/state", "/quit", "/exit",
];

/// Rustyline helper for slash-command tab completion.
struct ReplHelper;

impl Completer for ReplHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        Ok((0, complete_command(&line[..pos])))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if !line.starts_with('/') || pos < line.len() {
            return None;
        }

        SLASH_COMMANDS
            .iter()
            .find(|cmd| cmd.starts_with(line) && **cmd != line)
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Highlighter for ReplHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(format!("\x1b[90m{hint}\x1b[0m"))
    }
}

impl Validator for ReplHelper {}
impl Helper for ReplHelper {}

fn complete_command(prefix: &str) -> Vec<String> {
    if !prefix.starts_with('/') {
        return Vec::new();
    }
    SLASH_COMMANDS
        .iter()
        .filter(|cmd| cmd.starts_with(prefix))
        .map(|cmd| cmd.to_string())
        .collect()
}

/// Build a termimad skin with our color scheme.
fn make_skin() -> MadSkin {
    use termimad::crossterm::style::Color;

    let mut skin = MadSkin::default();
    skin.set_headers_fg(Color::Yellow);
    skin.bold.set_fg(Color::White);
    skin.italic.set_fg(Color::Magenta);
    skin.inline_code.set_fg(Color::Green);
    skin.code_block.set_fg(Color::Green);
    skin.code_block.left_margin = 2;
    skin
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Help,
    Back,
    Forward,
    Reset,
    Export,
    State,
    Quit,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Command(Command),
    Text(String),
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('/') {
        return Some(Input::Text(line.to_string()));
    }

    let command = match line.to_lowercase().as_str() {
        "/help" => Command::Help,
        "/back" => Command::Back,
        "/forward" => Command::Forward,
        "/reset" => Command::Reset,
        "/export" => Command::Export,
        "/state" => Command::State,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    };
    Some(Input::Command(command))
}

/// Record id typed on a selection step; `#3` and `3.` are accepted too.
fn parse_choice(text: &str) -> Option<i64> {
    text.trim()
        .trim_start_matches('#')
        .trim_end_matches('.')
        .parse()
        .ok()
}

/// Product details collected one field per line.
#[derive(Debug, Default)]
struct DetailsDraft {
    category: Option<String>,
    features: Option<String>,
}

impl DetailsDraft {
    fn field(&self) -> &'static str {
        match (&self.category, &self.features) {
            (None, _) => "category",
            (Some(_), None) => "features",
            (Some(_), Some(_)) => "brand image",
        }
    }

    /// Store the next field; the third one completes the draft.
    fn push(&mut self, value: String) -> Option<ProductDetails> {
        if self.category.is_none() {
            self.category = Some(value);
            None
        } else if self.features.is_none() {
            self.features = Some(value);
            None
        } else {
            let draft = std::mem::take(self);
            Some(ProductDetails::new(
                draft.category.unwrap_or_default(),
                draft.features.unwrap_or_default(),
                value,
            ))
        }
    }
}

fn prompt_for(step: Step, draft: &DetailsDraft) -> String {
    let label = match step {
        Step::KeywordEntry => "keyword",
        Step::PersonaSelection => "persona #",
        Step::IdeaSelection => "idea #",
        Step::DetailsEntry => draft.field(),
        Step::NameSelection => "name #",
        Step::CanvasDisplay => "/export or /reset",
    };
    format!("\x1b[90m{label}\x1b[0m \x1b[1;36m\u{203A}\x1b[0m ")
}

/// Markdown view of the current step.
fn render_step(state: &WorkflowState) -> String {
    let mut out = format!("# {}\n\n", state.step.indicator());

    match state.step {
        Step::KeywordEntry => {
            out.push_str("Enter a keyword to generate target personas.\n");
        }
        Step::PersonaSelection => {
            out.push_str(&format!("Personas for **{}**:\n\n", state.keyword));
            for persona in &state.personas {
                out.push_str(&format!("**{}.** {}\n", persona.id, persona.description));
                if !persona.needs.explicit.is_empty() {
                    out.push_str(&format!("  - *explicit:* {}\n", persona.needs.explicit));
                }
                if !persona.needs.implicit.is_empty() {
                    out.push_str(&format!("  - *implicit:* {}\n", persona.needs.implicit));
                }
            }
        }
        Step::IdeaSelection => {
            if let Some(persona) = &state.selected_persona {
                out.push_str(&format!("Ideas for *{}*:\n\n", persona.description));
            }
            for idea in &state.business_ideas {
                out.push_str(&format!("**{}.** {}\n", idea.id, idea.idea));
                if let Some(method) = &idea.method_hint {
                    out.push_str(&format!("  - *method:* {method}\n"));
                }
            }
        }
        Step::DetailsEntry => {
            if let Some(idea) = &state.selected_idea {
                out.push_str(&format!("Idea: **{}**\n\n", idea.idea));
            }
            out.push_str("Describe the product: category, features, brand image.\n");
            let details = &state.product_details;
            if details.is_complete() {
                out.push_str(&format!(
                    "\nPrevious answer: `{}` / `{}` / `{}`\n",
                    details.category, details.features, details.brand_image
                ));
            }
        }
        Step::NameSelection => {
            for name in &state.product_names {
                out.push_str(&format!("**{}.** **{}**", name.id, name.name));
                if !name.reason.is_empty() {
                    out.push_str(&format!(" - {}", name.reason));
                }
                out.push('\n');
                if !name.pros.is_empty() {
                    out.push_str(&format!("  - *pros:* {}\n", name.pros));
                }
                if !name.cons.is_empty() {
                    out.push_str(&format!("  - *cons:* {}\n", name.cons));
                }
            }
        }
        Step::CanvasDisplay => {
            if let Some(name) = &state.selected_product_name {
                out.push_str(&format!("Product: **{}**\n\n", name.name));
            }
            match &state.lean_canvas {
                Some(canvas) => out.push_str(&canvas.to_markdown()),
                None => out.push_str("*no canvas*\n"),
            }
        }
    }
    out
}

fn print_markdown(skin: &MadSkin, markdown: &str) {
    let width = crossterm::terminal::size()
        .map(|(w, _)| w as usize)
        .unwrap_or(80);
    eprintln!("\x1b[90m{}\x1b[0m", "\u{2500}".repeat(width.min(80)));
    print!("{}", termimad::FmtText::from(skin, markdown, Some(width)));
    println!();
}

fn print_help() {
    println!();
    println!("  \x1b[1mWizard\x1b[0m");
    println!("  \x1b[36m/back\x1b[0m        previous step, keeps data");
    println!("  \x1b[36m/forward\x1b[0m     next step if already generated");
    println!("  \x1b[36m/reset\x1b[0m       start over");
    println!("  \x1b[36m/export\x1b[0m      save the canvas as JSON");
    println!("  \x1b[36m/state\x1b[0m       show raw state");
    println!("  \x1b[36m/quit\x1b[0m        exit");
    println!();
}

fn print_error(err: &WorkflowError) {
    eprintln!("  \x1b[31m\u{2717} {err}\x1b[0m");
}

fn print_status(task: TaskKind) {
    let label = match task {
        TaskKind::Persona => "generating personas",
        TaskKind::BusinessIdea => "generating business ideas",
        TaskKind::ProductName => "generating product names",
        TaskKind::Canvas => "building lean canvas",
    };
    eprintln!("  \x1b[90m\u{25CB} {label}...\x1b[0m");
}

/// Get the history file path (~/.leancanvas/history).
fn history_path() -> PathBuf {
    crate::bootstrap::leancanvas_base_dir().join("history")
}

fn write_export(workflow: &Workflow, dir: &Path) -> anyhow::Result<PathBuf> {
    let export = workflow.export()?;
    let path = dir.join(export.file_name());
    std::fs::write(&path, export.to_json_pretty()?)?;
    Ok(path)
}

/// Outcome of one line of input.
enum Flow {
    Continue { rerender: bool },
    Quit,
}

struct Wizard<'a> {
    gateway: &'a dyn UpstreamGateway,
    workflow: Workflow,
    draft: DetailsDraft,
}

impl<'a> Wizard<'a> {
    fn new(gateway: &'a dyn UpstreamGateway, config: WorkflowConfig) -> Self {
        Self {
            gateway,
            workflow: Workflow::new(config),
            draft: DetailsDraft::default(),
        }
    }

    async fn handle(&mut self, input: Input) -> Flow {
        let result = match input {
            Input::Command(command) => return self.command(command),
            Input::Text(text) => self.text(text).await,
        };
        match result {
            Ok(()) => Flow::Continue { rerender: true },
            Err(err) => {
                print_error(&err);
                Flow::Continue { rerender: false }
            }
        }
    }

    fn command(&mut self, command: Command) -> Flow {
        let moved = match command {
            Command::Quit => return Flow::Quit,
            Command::Help => {
                print_help();
                return Flow::Continue { rerender: false };
            }
            Command::Back => self.workflow.go_back().map(|_| ()),
            Command::Forward => self.workflow.go_forward().map(|_| ()),
            Command::Reset => {
                self.workflow.reset();
                Ok(())
            }
            Command::Export => {
                match write_export(&self.workflow, Path::new(".")) {
                    Ok(path) => println!("  \x1b[32m\u{25CF} saved {}\x1b[0m", path.display()),
                    Err(e) => eprintln!("  \x1b[31m\u{2717} {e}\x1b[0m"),
                }
                return Flow::Continue { rerender: false };
            }
            Command::State => {
                match serde_json::to_string_pretty(self.workflow.state()) {
                    Ok(json) => println!("{json}"),
                    Err(e) => eprintln!("  \x1b[31m\u{2717} {e}\x1b[0m"),
                }
                return Flow::Continue { rerender: false };
            }
            Command::Unknown(raw) => {
                eprintln!("  \x1b[90munknown command {raw}, try /help\x1b[0m");
                return Flow::Continue { rerender: false };
            }
        };

        self.draft = DetailsDraft::default();
        match moved {
            Ok(()) => Flow::Continue { rerender: true },
            Err(err) => {
                print_error(&err);
                Flow::Continue { rerender: false }
            }
        }
    }

    async fn text(&mut self, text: String) -> Result<(), WorkflowError> {
        let gateway = self.gateway;
        match self.workflow.step() {
            Step::KeywordEntry => {
                print_status(TaskKind::Persona);
                self.workflow.generate_personas(gateway, &text).await
            }
            Step::PersonaSelection => {
                let id = choice(&text)?;
                print_status(TaskKind::BusinessIdea);
                self.workflow.select_persona(gateway, id).await
            }
            Step::IdeaSelection => self.workflow.select_business_idea(choice(&text)?),
            Step::DetailsEntry => match self.draft.push(text) {
                Some(details) => {
                    print_status(TaskKind::ProductName);
                    self.workflow.submit_product_details(gateway, details).await
                }
                None => Ok(()),
            },
            Step::NameSelection => {
                let id = choice(&text)?;
                print_status(TaskKind::Canvas);
                self.workflow.select_product_name(gateway, id).await
            }
            Step::CanvasDisplay => Err(WorkflowError::Validation(
                "the canvas is complete; use /export or /reset".to_string(),
            )),
        }
    }
}

fn choice(text: &str) -> Result<i64, WorkflowError> {
    parse_choice(text).ok_or_else(|| WorkflowError::Validation(format!("not a number: {text}")))
}

/// Run the wizard until `/quit` or end of input.
///
/// `keyword` skips the first prompt and generates personas immediately.
pub async fn run_repl(
    gateway: &dyn UpstreamGateway,
    config: WorkflowConfig,
    keyword: Option<String>,
) -> anyhow::Result<()> {
    let editor_config = Config::builder()
        .history_ignore_dups(true)?
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .build();
    let mut rl: Editor<ReplHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(editor_config)?;
    rl.set_helper(Some(ReplHelper));

    let hist_path = history_path();
    if let Some(parent) = hist_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = rl.load_history(&hist_path);

    println!(
        "\x1b[1mleancanvas\x1b[0m  upstream: {}  /help for commands, /quit to exit",
        gateway.name()
    );
    println!();

    let skin = make_skin();
    let mut wizard = Wizard::new(gateway, config);
    if let Some(keyword) = keyword {
        wizard.handle(Input::Text(keyword)).await;
    }
    let mut rerender = true;

    loop {
        if rerender {
            print_markdown(&skin, &render_step(wizard.workflow.state()));
        }

        let prompt = prompt_for(wizard.workflow.step(), &wizard.draft);
        let line = match tokio::task::block_in_place(|| rl.readline(&prompt)) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("\x1b[90m/quit to exit\x1b[0m");
                rerender = false;
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                let _ = rl.save_history(&hist_path);
                return Err(e.into());
            }
        };

        let Some(input) = parse_input(&line) else {
            rerender = false;
            continue;
        };
        match wizard.handle(input).await {
            Flow::Quit => break,
            Flow::Continue { rerender: r } => rerender = r,
        }
    }

    let _ = rl.save_history(&hist_path);
    Ok(())
}
