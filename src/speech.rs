//! 朗读：人格音色 + 可等待、可中止的语音任务
//!
//! 语音合成交给外部命令（默认 espeak-ng）。每次朗读是一个后台任务：
//! SpeechHandle::stop 通过 CancellationToken 中止，wait 通过 oneshot 拿到结束状态。

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::SpeechSection;
use crate::persona::Persona;

/// espeak-ng 的默认语速（词 / 分钟）与音高（0-99）
const BASE_WORDS_PER_MINUTE: f32 = 175.0;
const BASE_PITCH: f32 = 50.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpeechError {
    #[error("Permission denied while starting speech: {0}")]
    PermissionDenied(String),

    #[error("Speech synthesizer unavailable: {0}")]
    Unavailable(String),

    #[error("Speech was interrupted")]
    Interrupted,

    #[error("Speech failed: {0}")]
    Failed(String),
}

impl SpeechError {
    fn from_io(command: &str, err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => SpeechError::Unavailable(format!("{} not found", command)),
            ErrorKind::PermissionDenied => SpeechError::PermissionDenied(command.to_string()),
            _ => SpeechError::Failed(err.to_string()),
        }
    }
}

/// 单个人格的音色
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceProfile {
    pub voice: String,
    /// 1.0 为正常语速
    pub rate: f32,
    /// 1.0 为正常音高
    pub pitch: f32,
}

impl VoiceProfile {
    pub fn for_persona(section: &SpeechSection, persona: Persona) -> Self {
        let v = section.voice(persona);
        Self {
            voice: v.voice.clone(),
            rate: v.rate,
            pitch: v.pitch,
        }
    }

    /// espeak-ng 参数：-v 音色 -s 语速 -p 音高
    pub fn command_args(&self) -> Vec<String> {
        let wpm = (BASE_WORDS_PER_MINUTE * self.rate).round().clamp(80.0, 450.0) as u32;
        let pitch = (BASE_PITCH * self.pitch).round().clamp(0.0, 99.0) as u32;
        vec![
            "-v".to_string(),
            self.voice.clone(),
            "-s".to_string(),
            wpm.to_string(),
            "-p".to_string(),
            pitch.to_string(),
        ]
    }
}

/// 语音合成抽象：朗读（可中止）与录制到文件
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn speak(&self, text: &str, voice: &VoiceProfile, cancel: CancellationToken) -> Result<(), SpeechError>;

    async fn record(&self, text: &str, voice: &VoiceProfile, path: &Path) -> Result<PathBuf, SpeechError>;
}

/// 调用外部 TTS 命令
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    command: String,
}

impl CommandSynthesizer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn command(&self, voice: &VoiceProfile) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(voice.command_args())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn speak(&self, text: &str, voice: &VoiceProfile, cancel: CancellationToken) -> Result<(), SpeechError> {
        let mut child = self
            .command(voice)
            .arg(text)
            .spawn()
            .map_err(|e| SpeechError::from_io(&self.command, e))?;
        tracing::debug!(command = %self.command, "speech started");

        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|e| SpeechError::Failed(e.to_string()))?;
                if status.success() {
                    Ok(())
                } else {
                    Err(SpeechError::Failed(format!("{} exited with {}", self.command, status)))
                }
            }
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                Err(SpeechError::Interrupted)
            }
        }
    }

    async fn record(&self, text: &str, voice: &VoiceProfile, path: &Path) -> Result<PathBuf, SpeechError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SpeechError::from_io(&self.command, e))?;
        }
        let output = self
            .command(voice)
            .arg("-w")
            .arg(path)
            .arg(text)
            .output()
            .await
            .map_err(|e| SpeechError::from_io(&self.command, e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SpeechError::Failed(format!("Exit {:?}: {}", output.status, stderr.trim())));
        }
        tracing::info!("Recorded speech to {}", path.display());
        Ok(path.to_path_buf())
    }
}

/// 正在进行的朗读任务
pub struct SpeechHandle {
    cancel: CancellationToken,
    done: oneshot::Receiver<Result<(), SpeechError>>,
}

impl SpeechHandle {
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 等待朗读结束；任务被丢弃时视为中断
    pub async fn wait(self) -> Result<(), SpeechError> {
        self.done.await.unwrap_or(Err(SpeechError::Interrupted))
    }
}

/// 在后台开始朗读
pub fn start_speech(synth: Arc<dyn SpeechSynthesizer>, text: String, voice: VoiceProfile) -> SpeechHandle {
    let cancel = CancellationToken::new();
    let (tx, rx) = oneshot::channel();
    let token = cancel.clone();
    tokio::spawn(async move {
        let result = synth.speak(&text, &voice, token).await;
        if let Err(e) = &result {
            tracing::warn!("Speech ended with error: {}", e);
        }
        let _ = tx.send(result);
    });
    SpeechHandle { cancel, done: rx }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    /// 「朗读」固定时长，期间可被中止
    struct SleepSynthesizer(Duration);

    #[async_trait]
    impl SpeechSynthesizer for SleepSynthesizer {
        async fn speak(&self, _text: &str, _voice: &VoiceProfile, cancel: CancellationToken) -> Result<(), SpeechError> {
            tokio::select! {
                _ = tokio::time::sleep(self.0) => Ok(()),
                _ = cancel.cancelled() => Err(SpeechError::Interrupted),
            }
        }

        async fn record(&self, _text: &str, _voice: &VoiceProfile, path: &Path) -> Result<PathBuf, SpeechError> {
            Ok(path.to_path_buf())
        }
    }

    fn mia() -> VoiceProfile {
        VoiceProfile::for_persona(&SpeechSection::default(), Persona::Mia)
    }

    #[test]
    fn test_voice_args() {
        assert_eq!(mia().command_args(), vec!["-v", "en-gb", "-s", "164", "-p", "45"]);
        let miette = VoiceProfile::for_persona(&SpeechSection::default(), Persona::Miette);
        assert_eq!(miette.command_args()[5], "65");
    }

    #[tokio::test]
    async fn test_speech_completes() {
        let handle = start_speech(
            Arc::new(SleepSynthesizer(Duration::from_millis(5))),
            "hello".into(),
            mia(),
        );
        assert_eq!(handle.wait().await, Ok(()));
    }

    #[tokio::test]
    async fn test_stop_reports_interrupted() {
        let handle = start_speech(
            Arc::new(SleepSynthesizer(Duration::from_secs(30))),
            "hello".into(),
            mia(),
        );
        handle.stop();
        assert!(handle.is_stopped());
        assert_eq!(handle.wait().await, Err(SpeechError::Interrupted));
    }

    #[tokio::test]
    async fn test_missing_command_is_unavailable() {
        let synth = CommandSynthesizer::new("duet-no-such-tts-binary");
        let err = synth
            .speak("hello", &mia(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SpeechError::Unavailable(_)));
    }
}
