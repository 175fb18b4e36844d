use super::{SpeechBackend, Voice};

use std::io::{Error, ErrorKind, Read, Result};
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;
use wait_timeout::ChildExt;

pub struct EspeakBackend {
    binary: String,
    rate: u32,
    timeout: Duration,
}

impl EspeakBackend {
    pub fn new(binary: &str, rate: u32, timeout_secs: u64) -> Self {
        Self {
            binary: binary.to_string(),
            rate,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Waits for `child` with the configured deadline and returns its stdout.
    /// Both pipes are drained on helper threads so a large WAV or a chatty
    /// stderr can't fill a pipe buffer and stall the child before the deadline.
    fn collect(&self, mut child: Child) -> Result<Vec<u8>> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::new(ErrorKind::Other, "espeak stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::new(ErrorKind::Other, "espeak stderr not captured"))?;
        let out_reader = drain(stdout);
        let err_reader = drain(stderr);

        match child.wait_timeout(self.timeout)? {
            Some(status) => {
                let data = join_reader(out_reader)?;
                let err_output = join_reader(err_reader).unwrap_or_default();
                if status.success() {
                    Ok(data)
                } else {
                    Err(Error::new(
                        ErrorKind::Other,
                        format!("espeak error: {}", String::from_utf8_lossy(&err_output).trim()),
                    ))
                }
            }
            None => {
                // Timeout occurred, kill the process
                let _ = child.kill();
                let _ = child.wait();
                Err(Error::new(
                    ErrorKind::TimedOut,
                    format!("Backend timed out after {}s", self.timeout.as_secs()),
                ))
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf).map(|_| buf)
    })
}

fn join_reader(reader: JoinHandle<Result<Vec<u8>>>) -> Result<Vec<u8>> {
    reader
        .join()
        .map_err(|_| Error::new(ErrorKind::Other, "espeak reader panicked"))?
}

impl SpeechBackend for EspeakBackend {
    fn id(&self) -> &'static str {
        "espeak-ng"
    }

    fn probe(&self) -> Result<()> {
        let child = Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let version = self.collect(child)?;
        tracing::info!(
            "espeak: {}",
            String::from_utf8_lossy(&version).lines().next().unwrap_or("unknown version")
        );
        Ok(())
    }

    fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--stdout").arg("-s").arg(self.rate.to_string());
        if let Some(voice) = voice {
            cmd.arg("-v").arg(voice);
        }
        // "--" keeps text starting with '-' from being read as a flag
        let child = cmd
            .arg("--")
            .arg(text)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        self.collect(child)
    }

    fn list_voices(&self) -> Result<Vec<Voice>> {
        let child = Command::new(&self.binary)
            .arg("--voices")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let output = self.collect(child)?;
        Ok(parse_voices(&String::from_utf8_lossy(&output)))
    }
}

/// Parses `espeak-ng --voices` output:
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  af              --/M      Afrikaans          gmw/af
///  5  en-us           --/M      English_(America)  gmw/en-US            (en 2)
///  5  cmn             --/M      Chinese_(Mandarin,_latin_as_English) sit/cmn (zh-cmn 5)(zh 5)
/// ```
fn parse_voices(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("Pty"))
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 {
                return None;
            }
            let others = cols.get(5..).map(|rest| rest.join(" ")).unwrap_or_default();
            Some(Voice {
                id: cols[1].to_string(),
                name: cols[3].replace('_', " "),
                language: cols[1].to_ascii_lowercase(),
                aliases: parse_other_languages(&others),
            })
        })
        .collect()
}

/// `(zh-cmn 5)(zh 5)` -> `["zh-cmn", "zh"]`
fn parse_other_languages(column: &str) -> Vec<String> {
    column
        .split('(')
        .filter_map(|entry| entry.split_whitespace().next())
        .map(|tag| tag.trim_end_matches(')').to_ascii_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 5  en-us           --/M      English_(America)  gmw/en-US            (en 2)
 5  fr-fr           --/M      French_(France)    roa/fr               (fr 5)
 5  cmn             --/M      Chinese_(Mandarin,_latin_as_English) sit/cmn              (zh-cmn 5)(zh 5)
";

    #[test]
    fn test_parse_voices() {
        let voices = parse_voices(LISTING);
        assert_eq!(voices.len(), 4);
        assert_eq!(voices[1].id, "en-us");
        assert_eq!(voices[1].name, "English (America)");
        assert_eq!(voices[1].aliases, vec!["en".to_string()]);
        assert_eq!(voices[2].language, "fr-fr");
        assert!(voices[0].aliases.is_empty());
    }

    #[test]
    fn test_parse_voices_keeps_other_languages() {
        let voices = parse_voices(LISTING);
        let mandarin = &voices[3];
        assert_eq!(mandarin.id, "cmn");
        assert_eq!(mandarin.language, "cmn");
        assert_eq!(mandarin.aliases, vec!["zh-cmn".to_string(), "zh".to_string()]);
    }

    #[test]
    fn test_parse_voices_without_header() {
        assert!(parse_voices("").is_empty());
        assert!(parse_voices("espeak-ng: data path not found\n").is_empty());
    }

    #[cfg(unix)]
    fn shell(script: &str) -> Child {
        Command::new("sh")
            .arg("-c")
            .arg(script)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn test_collect_survives_a_flood_on_stderr() {
        let backend = EspeakBackend::new("espeak-ng", 175, 5);
        // Well past the pipe buffer size
        let child = shell("head -c 1000000 /dev/zero >&2; printf ok");
        assert_eq!(backend.collect(child).unwrap(), b"ok".to_vec());
    }

    #[cfg(unix)]
    #[test]
    fn test_collect_reports_stderr_on_failure() {
        let backend = EspeakBackend::new("espeak-ng", 175, 5);
        let err = backend.collect(shell("echo 'no voice' >&2; exit 3")).unwrap_err();
        assert!(err.to_string().contains("no voice"));
    }

    #[test]
    fn test_missing_binary_is_an_io_error() {
        let backend = EspeakBackend::new("definitely-not-espeak-ng", 175, 1);
        assert!(backend.probe().is_err());
        assert!(backend.synthesize("hello", None).is_err());
    }
}
