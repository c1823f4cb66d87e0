//! List command implementation.

use bibvault_store::RecordSummary;
use bibvault_sync_engine::{HttpTransport, RemoteTransport, ReqwestClient};
use bibvault_sync_protocol::CredentialHash;

use super::{tag_set, CliError};

/// Runs the list command.
pub fn run(
    server: &str,
    key: &str,
    tags: &[String],
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let transport = HttpTransport::new(server, ReqwestClient::new()?);
    let summaries = transport.list(&CredentialHash::from_secret(key), &tag_set(tags))?;
    println!("{}", render(&summaries, format)?);
    Ok(())
}

/// Formats summaries as text lines or a JSON array.
pub fn render(summaries: &[RecordSummary], format: &str) -> Result<String, Box<dyn std::error::Error>> {
    match format {
        "json" => Ok(serde_json::to_string_pretty(summaries)?),
        "text" => {
            let mut out = format!("{} records", summaries.len());
            for s in summaries {
                let title = s.bibtex.lines().next().unwrap_or("").trim();
                let file = if s.has_file {
                    format!("{} {:.2} MiB", s.doc_ext, s.doc_size)
                } else {
                    "-".to_string()
                };
                out.push_str(&format!(
                    "\n{}  {:.3}  [{}]  {}  {}",
                    s.uuid,
                    s.time_modify,
                    s.tags.to_sorted_vec().join(", "),
                    file,
                    title
                ));
            }
            Ok(out)
        }
        other => Err(CliError::Usage(format!("unknown format {other:?}")).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bibvault_store::{DocumentRecord, TagSet};

    fn summary() -> RecordSummary {
        let mut record = DocumentRecord::new("@article{key,\n title={T}}");
        record.tags = ["physics", "optics"].into_iter().collect::<TagSet>();
        RecordSummary::from_record(&record, 0.0)
    }

    #[test]
    fn text_lists_one_line_per_record() {
        let s = summary();
        let text = render(&[s.clone()], "text").unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "1 records");
        assert!(lines[1].starts_with(&s.uuid.to_string()));
        assert!(lines[1].contains("[optics, physics]"));
        assert!(lines[1].ends_with("@article{key,"));
    }

    #[test]
    fn json_round_trips_summaries() {
        let s = summary();
        let json = render(&[s.clone()], "json").unwrap();
        let back: Vec<RecordSummary> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![s]);
    }

    #[test]
    fn unknown_format() {
        assert!(render(&[], "xml").is_err());
    }
}
