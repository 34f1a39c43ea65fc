//! Code Block Semantic Utility
//!
//! Normalizes fence info strings and guesses a language label for code
//! blocks that were fenced without one.

pub struct CodeBlockAnalyzer;

/// Content markers per language, checked in order. The first language with
/// any matching marker wins.
const SIGNATURES: &[(&str, &[&str])] = &[
    ("bash", &["#!/bin/bash", "#!/bin/sh", "#!/usr/bin/env bash", "$ sudo ", "$ cd ", "echo $"]),
    ("rust", &["fn main(", "let mut ", "impl ", "pub fn ", "use std::", "println!("]),
    ("python", &["def ", "import ", "print(", "self.", "elif "]),
    ("go", &["package main", "func ", ":= "]),
    ("java", &["public class ", "System.out.", "public static void"]),
    ("cpp", &["#include", "std::", "int main("]),
    ("sql", &["SELECT ", "INSERT INTO", "CREATE TABLE", "UPDATE "]),
    ("javascript", &["function ", "const ", "console.log", "=> {", "require("]),
    ("html", &["<!DOCTYPE", "<html", "<div", "</"]),
    ("css", &["{\n  color:", "font-size:", "margin:", "padding:"]),
];

impl CodeBlockAnalyzer {
    /// Extracts the language from a fence info string (the text after the
    /// opening backticks). Only the first word is kept, lowercased.
    pub fn fence_language(info: &str) -> Option<String> {
        let word = info.trim().trim_start_matches('`').split_whitespace().next()?;
        let word = word.trim_matches(|c: char| c == '{' || c == '}' || c == '.');
        if word.is_empty() {
            None
        } else {
            Some(word.to_ascii_lowercase())
        }
    }

    /// Guesses a display label from code content. Falls back to `"text"`.
    pub fn detect_language(content: &str) -> String {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return "text".to_string();
        }
        if (trimmed.starts_with('{') && trimmed.ends_with('}') && trimmed.contains("\":"))
            || (trimmed.starts_with("[{") && trimmed.ends_with("}]"))
        {
            return "json".to_string();
        }
        SIGNATURES
            .iter()
            .find(|(_, markers)| markers.iter().any(|marker| trimmed.contains(marker)))
            .map(|(language, _)| language.to_string())
            .unwrap_or_else(|| "text".to_string())
    }
}
