use std::fs;
use std::io::{self, BufRead};

use serde::Serialize;

use ds_core::detect::{find_slop, SlopKind};

#[derive(Debug, Serialize)]
struct Verdict<'a> {
    text: &'a str,
    slop: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    character: Option<String>,
}

fn kind_name(kind: SlopKind) -> &'static str {
    match kind {
        SlopKind::Emoji => "emoji",
        SlopKind::EmDash => "em-dash",
    }
}

fn verdict(text: &str) -> Verdict<'_> {
    let found = find_slop(text);
    Verdict {
        text,
        slop: found.is_some(),
        kind: found.map(|m| kind_name(m.kind)),
        offset: found.map(|m| m.offset),
        character: found.map(|m| format!("U+{:04X}", m.ch as u32)),
    }
}

fn read_inputs(texts: &[String], file: Option<&str>) -> Result<Vec<String>, String> {
    if let Some(path) = file {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
        return Ok(content.lines().map(str::to_string).collect());
    }
    if !texts.is_empty() {
        return Ok(texts.to_vec());
    }
    io::stdin()
        .lock()
        .lines()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("Failed to read stdin: {}", e))
}

pub fn run_check(texts: &[String], file: Option<&str>, json: bool) -> Result<(), String> {
    let inputs = read_inputs(texts, file)?;
    let verdicts: Vec<Verdict<'_>> = inputs.iter().map(|text| verdict(text)).collect();

    if json {
        let out = serde_json::to_string_pretty(&verdicts)
            .map_err(|e| format!("Failed to encode JSON: {}", e))?;
        println!("{}", out);
        return Ok(());
    }

    let slop_count = verdicts.iter().filter(|v| v.slop).count();
    for v in &verdicts {
        match (v.kind, &v.character) {
            (Some(kind), Some(ch)) => println!("SLOP   {:<8} {:<8} {}", kind, ch, v.text),
            _ => println!("clean  {:<8} {:<8} {}", "", "", v.text),
        }
    }
    println!();
    println!("{} of {} flagged", slop_count, verdicts.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_fields() {
        let v = verdict("done \u{2014} next");
        assert!(v.slop);
        assert_eq!(v.kind, Some("em-dash"));
        assert_eq!(v.offset, Some(5));
        assert_eq!(v.character.as_deref(), Some("U+2014"));

        let v = verdict("done");
        assert!(!v.slop);
        assert_eq!(v.kind, None);
    }

    #[test]
    fn test_verdict_json_omits_empty_fields() {
        let json = serde_json::to_string(&verdict("ok")).unwrap();
        assert_eq!(json, r#"{"text":"ok","slop":false}"#);
    }
}
