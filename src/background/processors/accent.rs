use anyhow::{Context, Result, anyhow, bail};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Mutex;

/// Model label to display name. Labels the model emits that are not listed
/// here surface with no display name rather than an error.
/// "southatlandtic" is the label the model actually emits.
pub const ACCENT_DISPLAY_NAMES: &[(&str, &str)] = &[
    ("australia", "Australian"),
    ("canada", "Canadian"),
    ("england", "British"),
    ("us", "American"),
    ("philippines", "Filipino"),
    ("africa", "South African"),
    ("newzealand", "New Zealand"),
    ("ireland", "Irish"),
    ("scotland", "Scottish"),
    ("wales", "Welsh"),
    ("malaysia", "Malaysian"),
    ("singapore", "Singaporean"),
    ("bermuda", "Bermudian"),
    ("hongkong", "Hong Kong"),
    ("india", "Indian"),
    ("southatlandtic", "South Atlantic"),
];

pub fn display_name(label: &str) -> Option<&'static str> {
    ACCENT_DISPLAY_NAMES
        .iter()
        .find(|(code, _)| *code == label)
        .map(|(_, name)| *name)
}

/// Raw model output for one audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct AccentPrediction {
    /// Accent code as emitted by the model, e.g. "england".
    pub label: String,
    /// Softmax probability of that label, in `[0, 1]`.
    pub probability: f64,
}

/// Seam between the pipeline and the accent model.
pub trait AccentClassifier: Send + Sync {
    fn classify(&self, audio: &Path) -> Result<AccentPrediction>;
}

const WORKER_SOURCE: &str = include_str!("accent_worker.py");

/// Classifier backed by a persistent Python helper process running the
/// pretrained SpeechBrain model. The model is loaded exactly once, when the
/// helper starts; requests are serialized through a mutex since the helper
/// answers one at a time.
#[derive(Debug)]
pub struct SpeechBrainClassifier {
    worker: Mutex<ClassifierWorker>,
}

impl SpeechBrainClassifier {
    /// Spawn the helper and wait for its ready handshake. Returns an error
    /// if the interpreter cannot be started or the model fails to load.
    pub fn spawn(python_bin: &str, model_source: &str, cache_dir: &Path) -> Result<Self> {
        fs::create_dir_all(cache_dir)
            .context(format!("failed to create model cache dir {:?}", cache_dir))?;
        let cache_dir = fs::canonicalize(cache_dir)
            .context(format!("failed to resolve model cache dir {:?}", cache_dir))?;
        let savedir = cache_dir
            .join("pretrained_models")
            .join(model_source.rsplit('/').next().unwrap_or(model_source));

        let mut child = Command::new(python_bin)
            .arg("-c")
            .arg(WORKER_SOURCE)
            .arg(model_source)
            .arg(&savedir)
            .env("HF_HOME", &cache_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .context(format!(
                "failed to spawn {} for the accent model",
                python_bin
            ))?;

        let stdin = child
            .stdin
            .take()
            .context("failed to open the classifier worker stdin")?;
        let stdout = child
            .stdout
            .take()
            .context("failed to open the classifier worker stdout")?;
        let mut worker = ClassifierWorker {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        };

        match worker.read_reply()? {
            WorkerReply::Ready { ready: true } => {}
            WorkerReply::Failure { error } => bail!("classifier failed to start: {}", error),
            WorkerReply::Ready { ready: false } | WorkerReply::Prediction { .. } => {
                bail!("unexpected reply during classifier startup")
            }
        }
        info!(
            "Accent model '{}' loaded (cache at {:?})",
            model_source, cache_dir
        );

        Ok(Self {
            worker: Mutex::new(worker),
        })
    }
}

impl AccentClassifier for SpeechBrainClassifier {
    fn classify(&self, audio: &Path) -> Result<AccentPrediction> {
        ensure_audio_present(audio)?;
        let mut worker = self
            .worker
            .lock()
            .map_err(|err| anyhow!("classifier worker mutex poisoned: {:?}", err))?;
        worker.predict(audio)
    }
}

/// The model cannot report a useful error for a missing or empty file, so
/// both are caught before the request is sent.
fn ensure_audio_present(audio: &Path) -> Result<()> {
    let meta = fs::metadata(audio).map_err(|_| anyhow!("audio file not found at: {:?}", audio))?;
    if meta.len() == 0 {
        bail!("audio file is empty at: {:?}", audio);
    }
    Ok(())
}

#[derive(Debug)]
struct ClassifierWorker {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

#[derive(Serialize)]
struct WorkerRequest<'a> {
    audio: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WorkerReply {
    Failure { error: String },
    Ready { ready: bool },
    Prediction { label: String, score: f64 },
}

impl ClassifierWorker {
    fn predict(&mut self, audio: &Path) -> Result<AccentPrediction> {
        let request = serde_json::to_string(&WorkerRequest {
            audio: &audio.to_string_lossy(),
        })?;
        self.stdin
            .write_all(request.as_bytes())
            .and_then(|_| self.stdin.write_all(b"\n"))
            .and_then(|_| self.stdin.flush())
            .context("failed to send a request to the classifier worker")?;

        match self.read_reply()? {
            WorkerReply::Prediction { label, score } => Ok(AccentPrediction {
                label,
                probability: score,
            }),
            WorkerReply::Failure { error } => Err(anyhow!(error)),
            WorkerReply::Ready { .. } => bail!("unexpected handshake from the classifier worker"),
        }
    }

    fn read_reply(&mut self) -> Result<WorkerReply> {
        let mut line = String::new();
        let read = self
            .stdout
            .read_line(&mut line)
            .context("failed to read from the classifier worker")?;
        if read == 0 {
            bail!("classifier worker exited unexpectedly");
        }
        serde_json::from_str(line.trim())
            .context(format!("malformed reply from the classifier worker: {}", line.trim()))
    }
}

impl Drop for ClassifierWorker {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn known_labels_map_to_display_names() {
        assert_eq!(display_name("england"), Some("British"));
        assert_eq!(display_name("us"), Some("American"));
        assert_eq!(display_name("southatlandtic"), Some("South Atlantic"));
    }

    #[test]
    fn unknown_labels_have_no_display_name() {
        assert_eq!(display_name("klingon"), None);
        assert_eq!(display_name(""), None);
    }

    #[test]
    fn audio_precheck_rejects_missing_and_empty_files() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.wav");
        let err = ensure_audio_present(&missing).unwrap_err();
        assert!(err.to_string().contains("not found"));

        let empty = dir.path().join("empty.wav");
        fs::write(&empty, b"").unwrap();
        let err = ensure_audio_present(&empty).unwrap_err();
        assert!(err.to_string().contains("is empty"));

        let present = dir.path().join("audio.wav");
        fs::write(&present, b"RIFF").unwrap();
        ensure_audio_present(&present).unwrap();
    }

    #[test]
    fn worker_replies_parse_into_the_right_variants() {
        assert!(matches!(
            serde_json::from_str::<WorkerReply>(r#"{"ready": true}"#).unwrap(),
            WorkerReply::Ready { ready: true }
        ));
        assert!(matches!(
            serde_json::from_str::<WorkerReply>(r#"{"error": "boom"}"#).unwrap(),
            WorkerReply::Failure { error } if error == "boom"
        ));
        match serde_json::from_str::<WorkerReply>(r#"{"label": "england", "score": 0.9142}"#)
            .unwrap()
        {
            WorkerReply::Prediction { label, score } => {
                assert_eq!(label, "england");
                assert!((score - 0.9142).abs() < f64::EPSILON);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[cfg(unix)]
    mod with_fake_worker {
        use super::*;
        use crate::background::processors::test_support::fake_tool;

        fn audio_fixture(dir: &Path) -> std::path::PathBuf {
            let audio = dir.join("audio.wav");
            fs::write(&audio, b"RIFF....WAVE").unwrap();
            audio
        }

        #[test]
        fn spawn_and_classify_through_the_line_protocol() {
            let dir = tempdir().unwrap();
            let python = fake_tool(
                dir.path(),
                "python3",
                r#"echo '{"ready": true}'
while read -r line; do
  echo '{"label": "england", "score": 0.9142}'
done"#,
            );

            let classifier =
                SpeechBrainClassifier::spawn(&python, "acme/accent-model", dir.path()).unwrap();
            let audio = audio_fixture(dir.path());

            let prediction = classifier.classify(&audio).unwrap();
            assert_eq!(prediction.label, "england");
            assert!((prediction.probability - 0.9142).abs() < 1e-9);

            // The helper stays up between requests.
            let again = classifier.classify(&audio).unwrap();
            assert_eq!(again.label, "england");
        }

        #[test]
        fn classify_surfaces_worker_errors() {
            let dir = tempdir().unwrap();
            let python = fake_tool(
                dir.path(),
                "python3",
                r#"echo '{"ready": true}'
while read -r line; do
  echo '{"error": "model exploded"}'
done"#,
            );

            let classifier =
                SpeechBrainClassifier::spawn(&python, "acme/accent-model", dir.path()).unwrap();
            let audio = audio_fixture(dir.path());

            let err = classifier.classify(&audio).unwrap_err();
            assert!(err.to_string().contains("model exploded"));
        }

        #[test]
        fn spawn_fails_when_the_model_cannot_load() {
            let dir = tempdir().unwrap();
            let python = fake_tool(
                dir.path(),
                "python3",
                r#"echo '{"error": "failed to load the accent model: torch missing"}'"#,
            );

            let err = SpeechBrainClassifier::spawn(&python, "acme/accent-model", dir.path())
                .unwrap_err();
            assert!(err.to_string().contains("classifier failed to start"));
        }

        #[test]
        fn classify_fails_when_the_worker_dies() {
            let dir = tempdir().unwrap();
            let python = fake_tool(dir.path(), "python3", r#"echo '{"ready": true}'"#);

            let classifier =
                SpeechBrainClassifier::spawn(&python, "acme/accent-model", dir.path()).unwrap();
            let audio = audio_fixture(dir.path());

            assert!(classifier.classify(&audio).is_err());
        }
    }
}
