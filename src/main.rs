//! Duet - 双人格改写器
//!
//! 入口：初始化日志、加载配置、组装 LLM / 渲染器 / 回合控制器，然后运行一次性改写或交互循环。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use duet::{
    clipboard::{copy_rewrite, paste_input, ClipboardProvider, SystemClipboard},
    config::{load_config, AppConfig},
    core::{
        DiagramCoordinator, DiagramEvent, DiagramOutcome, DiagramState, DuetError, RecoveryAction,
        RecoveryEngine, TurnController, TurnReport,
    },
    diagram::{create_renderer, DiagramRenderer, PLACEHOLDER_TEXT},
    export::{strip_markdown, Exporter},
    llm::create_llm_from_config,
    memory::PreferenceStore,
    persona::Persona,
    rewrite::RewriteService,
    samples::{flatten, load_samples, SampleGroup},
    speech::{start_speech, CommandSynthesizer, SpeechHandle, SpeechSynthesizer, VoiceProfile},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "duet")]
#[command(version)]
#[command(about = "Rewrite text in two personas, each with a self-correcting Mermaid diagram")]
struct Args {
    /// Extra config file (overrides config/default.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rewrite this text once and exit
    #[arg(long, short)]
    text: Option<String>,

    /// Export directory (overrides [app].output_dir)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// With --text: also write the exports
    #[arg(long)]
    export: bool,
}

const HELP: &str = "Commands:
  /new              start a new topic
  /samples          list sample prompts
  /sample N         rewrite sample N
  /export           export both rewrites (markdown, text, diagram, session)
  /copy mia|miette  copy a rewrite to the clipboard
  /paste            rewrite the text on the clipboard
  /speak mia|miette read a rewrite aloud
  /record mia|miette save a rewrite as audio
  /stop             stop reading
  /quit             exit
Anything else is rewritten by both personas.";

const AUDIO_HELP: &str = "Audio export: `/record mia` or `/record miette` writes a .wav next to the other exports. \
It uses the speech command from [speech] (espeak-ng by default); install it if recording fails.";

struct App {
    controller: TurnController,
    renderer: Arc<dyn DiagramRenderer>,
    exporter: Exporter,
    samples: Vec<SampleGroup>,
    preferences: PreferenceStore,
    synth: Arc<dyn SpeechSynthesizer>,
    config: AppConfig,
    recovery: RecoveryEngine,
    speaking: Option<SpeechHandle>,
    clipboard: Box<dyn ClipboardProvider>,
}

impl App {
    fn build(config: AppConfig, events: mpsc::UnboundedSender<DiagramEvent>) -> anyhow::Result<Self> {
        let llm = create_llm_from_config(&config).context("Failed to create LLM client")?;
        let service = Arc::new(
            RewriteService::new(llm).with_type_substitution(config.diagram.allow_type_substitution),
        );
        let renderer = create_renderer(&config.diagram.renderer);
        let coordinator = DiagramCoordinator::new(renderer.clone(), service.clone())
            .with_max_corrections(config.diagram.max_corrections)
            .with_events(events);

        Ok(Self {
            controller: TurnController::new(service, coordinator),
            renderer,
            exporter: Exporter::new(&config.app.output_dir),
            samples: load_samples(&config.app.samples_path),
            preferences: PreferenceStore::new(&config.app.preferences_path),
            synth: Arc::new(CommandSynthesizer::new(config.speech.command.clone())),
            recovery: RecoveryEngine::new(),
            speaking: None,
            clipboard: Box::new(SystemClipboard::new()),
            config,
        })
    }

    /// 返回 false 表示应退出
    async fn handle_line(&mut self, line: &str) -> anyhow::Result<bool> {
        let line = line.trim();
        let (cmd, arg) = match line.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };

        let result = match cmd {
            "" => Ok(()),
            "/quit" | "/exit" => return Ok(false),
            "/help" => {
                println!("{HELP}");
                Ok(())
            }
            "/new" => {
                self.controller.start_new_topic();
                println!("New topic. Type some text to rewrite.");
                Ok(())
            }
            "/samples" => {
                self.print_samples();
                Ok(())
            }
            "/sample" => match self.sample_text(arg) {
                Some(text) => self.send(&text).await,
                None => {
                    println!("Unknown sample. Use /samples to list them.");
                    Ok(())
                }
            },
            "/export" => self.export(),
            "/copy" => self.copy(arg),
            "/paste" => self.paste().await,
            "/speak" => self.speak(arg),
            "/record" => self.record(arg).await,
            "/stop" => {
                if let Some(handle) = self.speaking.take() {
                    handle.stop();
                }
                Ok(())
            }
            _ if cmd.starts_with('/') => {
                println!("Unknown command {cmd}.\n{HELP}");
                Ok(())
            }
            _ => self.send(line).await,
        };

        if let Err(err) = result {
            match self.recovery.handle(&err) {
                RecoveryAction::RetryTurn(msg) | RecoveryAction::ShowAndContinue(msg) => {
                    eprintln!("⚠ {msg}");
                }
                RecoveryAction::Abort(msg) => {
                    anyhow::bail!("Cannot continue: {msg}");
                }
            }
        }
        Ok(true)
    }

    async fn send(&mut self, text: &str) -> Result<(), DuetError> {
        let report = self.controller.send(text).await?;
        print_report(&report);
        Ok(())
    }

    fn print_samples(&self) {
        if self.samples.is_empty() {
            println!("No sample prompts available.");
            return;
        }
        let mut current = "";
        for (i, (group, prompt)) in flatten(&self.samples).into_iter().enumerate() {
            if group != current {
                println!("{group}");
                current = group;
            }
            println!("  {:>2}. {}", i + 1, prompt.label);
        }
    }

    fn sample_text(&self, arg: &str) -> Option<String> {
        let n: usize = arg.parse().ok()?;
        flatten(&self.samples)
            .get(n.checked_sub(1)?)
            .map(|(_, p)| p.value.clone())
    }

    fn export(&self) -> Result<(), DuetError> {
        let Some(generation_id) = self.controller.generation_id() else {
            println!("Nothing to export yet.");
            return Ok(());
        };
        for persona in Persona::ALL {
            let Some(thread) = self.controller.thread(persona) else {
                continue;
            };
            let Some(message) = thread.conversation.last_model() else {
                continue;
            };
            let mut saved = self
                .exporter
                .export_reply(self.renderer.as_ref(), message, generation_id, persona)?;
            saved.push(
                self.exporter
                    .write_session(&thread.conversation, generation_id, persona)?,
            );
            for path in saved {
                println!("Saved {}", path.display());
            }
        }
        Ok(())
    }

    fn copy(&mut self, arg: &str) -> Result<(), DuetError> {
        let Some(persona) = Persona::parse(arg) else {
            println!("Usage: /copy mia|miette");
            return Ok(());
        };
        let Some(rewrite) = self.latest_rewrite(persona) else {
            println!("{persona} has nothing to copy yet.");
            return Ok(());
        };
        copy_rewrite(self.clipboard.as_mut(), &rewrite)?;
        println!("Copied {persona}'s rewrite.");
        Ok(())
    }

    async fn paste(&mut self) -> Result<(), DuetError> {
        let text = paste_input(self.clipboard.as_mut())?;
        println!("Pasted {} characters from the clipboard.", text.chars().count());
        self.send(&text).await
    }

    fn latest_rewrite(&self, persona: Persona) -> Option<String> {
        self.controller
            .thread(persona)?
            .conversation
            .last_model()
            .map(|m| m.rewrite.clone())
    }

    fn speak(&mut self, arg: &str) -> Result<(), DuetError> {
        let Some(persona) = Persona::parse(arg) else {
            println!("Usage: /speak mia|miette");
            return Ok(());
        };
        let Some(rewrite) = self.latest_rewrite(persona) else {
            println!("{persona} has nothing to read yet.");
            return Ok(());
        };
        if let Some(previous) = self.speaking.take() {
            previous.stop();
        }
        let voice = VoiceProfile::for_persona(&self.config.speech, persona);
        self.speaking = Some(start_speech(self.synth.clone(), strip_markdown(&rewrite), voice));
        Ok(())
    }

    async fn record(&self, arg: &str) -> Result<(), DuetError> {
        let Some(persona) = Persona::parse(arg) else {
            println!("Usage: /record mia|miette");
            return Ok(());
        };
        let (Some(rewrite), Some(generation_id)) =
            (self.latest_rewrite(persona), self.controller.generation_id())
        else {
            println!("{persona} has nothing to record yet.");
            return Ok(());
        };
        if self.preferences.first_audio_export() {
            println!("{AUDIO_HELP}");
        }
        let path = self.exporter.path_for(&rewrite, generation_id, persona, "wav");
        let voice = VoiceProfile::for_persona(&self.config.speech, persona);
        let saved = self.synth.record(&strip_markdown(&rewrite), &voice, &path).await?;
        println!("Saved {}", saved.display());
        Ok(())
    }
}

fn print_report(report: &TurnReport) {
    for reply in &report.replies {
        println!("\n{} {}\n{}", reply.persona.icon(), reply.persona, reply.rewrite);
        match &reply.outcome {
            DiagramOutcome::Rendered { artifact, corrections } => {
                if *corrections > 0 {
                    println!("(diagram corrected {corrections} time(s))");
                }
                if artifact.extension == "svg" {
                    println!("[svg diagram, {} bytes]", artifact.content.len());
                } else {
                    println!("```mermaid\n{}\n```", artifact.content);
                }
            }
            DiagramOutcome::PermanentlyFailed { .. } => println!("{PLACEHOLDER_TEXT}"),
            DiagramOutcome::NoDiagram => {}
        }
    }
}

/// 把修复过程打印到 stderr，不打断 stdout 的改写输出
fn spawn_event_printer(mut rx: mpsc::UnboundedReceiver<DiagramEvent>) {
    tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            match ev.state {
                DiagramState::Correcting => eprintln!(
                    "⟳ {}: correcting diagram ({})",
                    ev.persona,
                    ev.detail.unwrap_or_default()
                ),
                DiagramState::PermanentlyFailed => {
                    eprintln!("✗ {}: diagram could not be rendered", ev.persona)
                }
                _ => {}
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    duet::observability::init();

    let args = Args::parse();
    let mut config = load_config(args.config.clone()).context("Failed to load config")?;
    if let Some(dir) = args.out_dir {
        config.app.output_dir = dir;
    }

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    spawn_event_printer(event_rx);
    let mut app = App::build(config, event_tx)?;

    if let Some(text) = args.text {
        let report = app.controller.send(&text).await.context("Rewrite failed")?;
        print_report(&report);
        if args.export {
            app.export().context("Export failed")?;
        }
        return Ok(());
    }

    println!("Duet: {} and {} rewrite your text. /help for commands.", Persona::Mia, Persona::Miette);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        if !app.handle_line(&line).await? {
            break;
        }
    }

    if let Some(handle) = app.speaking.take() {
        handle.stop();
    }
    Ok(())
}
