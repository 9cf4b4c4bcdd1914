//! Compilation pipeline
//!
//! Per-record parsing is pure and embarrassingly parallel: records fan
//! out over a rayon pool, each producing a partial graph (or an error
//! note), and fan back into the order-independent merge. The only
//! suspension point is the optional external structured-extraction
//! collaborator, wrapped with a bounded timeout and a single heuristic
//! fallback - no retries.

use rayon::prelude::*;
use regex::Regex;
use serde_json::Value;
use std::io::Write;
use std::sync::mpsc;
use std::sync::{Arc, LazyLock, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::code::{canonicalize, subject_and_level, CanonProfile};
use crate::constraints::ConstraintExtractor;
use crate::domain::{Constraint, ConstraintKind, Envelope, Graph, Node, Provenance};
use crate::errors::{CompileError, CompileResult, ExtractorError};
use crate::hash::content_hash;
use crate::merge::{merge_partials, PartialGraph};
use crate::program::ProgramBuilder;
use crate::record::{decode_line, float_units, CourseRecord, EnrollmentField, InputRecord};
use crate::relations::{RelationClassifier, RelationHint};

/// External structured-extraction collaborator (e.g. an LLM-backed
/// normalizer). Treated as an untrusted black box: its output is subject
/// to the same validation as heuristic parsing, and any failure falls
/// back to the heuristic path.
pub trait StructuredExtractor: Send + Sync {
    fn extract(&self, raw: &Value) -> Result<Envelope, ExtractorError>;
}

/// Pipeline options.
#[derive(Clone)]
pub struct CompileOptions {
    pub profile: CanonProfile,
    pub extractor: Option<Arc<dyn StructuredExtractor>>,
    pub extractor_timeout_ms: u64,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            profile: CanonProfile::Compact,
            extractor: None,
            extractor_timeout_ms: 10_000,
        }
    }
}

/// Leading "CODE - " prefix on scraped titles ("CS 137 - Programming
/// Principles").
static TITLE_CODE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[A-Z]{2,6}[ -]?\d{2,4}[A-Z]?\s*[-:\u{2013}\u{2014}]?\s*").unwrap()
});

pub struct Compiler {
    options: CompileOptions,
    classifier: RelationClassifier,
    constraints: ConstraintExtractor,
    programs: ProgramBuilder,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompileOptions::default())
    }
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            classifier: RelationClassifier::new(options.profile),
            constraints: ConstraintExtractor::new(),
            programs: ProgramBuilder::new(options.profile),
            options,
        }
    }

    /// Compile a full JSONL input into the merged canonical graph.
    ///
    /// Records are processed in parallel; the fold over results is by
    /// input ordinal, so worker interleaving never changes the output.
    #[instrument(level = "info", skip(self, input))]
    pub fn compile_all(&self, input: &str) -> Graph {
        let lines: Vec<(usize, &str)> = input
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .enumerate()
            .collect();
        info!("compiling {} records", lines.len());

        let partials: Vec<PartialGraph> = lines
            .par_iter()
            .map(|(ordinal, line)| PartialGraph {
                ordinal: *ordinal,
                envelope: self.compile_line(line),
            })
            .collect();

        merge_partials(partials)
    }

    /// Compile records and stream one complete envelope per record to the
    /// sink, in completion order. Cancellation mid-run leaves a valid
    /// prefix of fully-written envelopes; no partial record is emitted.
    pub fn compile_stream<W: Write + Send>(
        &self,
        input: &str,
        sink: &EnvelopeSink<W>,
    ) -> CompileResult<usize> {
        let lines: Vec<&str> = input
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        lines
            .par_iter()
            .try_for_each(|line| sink.write_envelope(&self.compile_line(line)))?;
        Ok(lines.len())
    }

    /// Compile one input line into a partial envelope.
    ///
    /// When an external extractor is configured it gets the first shot at
    /// course and program records; on timeout or validation failure the
    /// heuristic path runs instead (at most one fallback, no retry).
    pub fn compile_line(&self, line: &str) -> Envelope {
        let record = decode_line(line);

        if let InputRecord::Course(_) | InputRecord::Program(_) = &record {
            if let Some(extractor) = &self.options.extractor {
                match self.try_external(extractor, line) {
                    Ok(envelope) => return envelope,
                    Err(e) => {
                        warn!("structured extraction failed, using heuristics: {}", e);
                        let mut envelope = self.compile_record(record, line);
                        envelope
                            .notes
                            .push(format!("structured extraction fell back: {}", e));
                        return envelope;
                    }
                }
            }
        }

        self.compile_record(record, line)
    }

    fn try_external(
        &self,
        extractor: &Arc<dyn StructuredExtractor>,
        line: &str,
    ) -> Result<Envelope, ExtractorError> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| ExtractorError::Schema(format!("input not decodable: {}", e)))?;
        let envelope = call_with_timeout(
            Arc::clone(extractor),
            value,
            self.options.extractor_timeout_ms,
        )?;
        // Minimal schema validation: an envelope that names nothing is a
        // failed extraction, not a usable result.
        if envelope.courses.is_empty()
            && envelope.course_sets.is_empty()
            && envelope.requirements.is_empty()
            && envelope.edges.is_empty()
        {
            return Err(ExtractorError::Schema("empty envelope".to_string()));
        }
        Ok(envelope)
    }

    fn compile_record(&self, record: InputRecord, raw_line: &str) -> Envelope {
        match record {
            InputRecord::Course(course) => self.compile_course(&course, raw_line),
            InputRecord::Program(program) => {
                let out = self.programs.build(&program);
                Envelope {
                    course_sets: out.course_sets,
                    requirements: out.requirements,
                    provenance: Some(Provenance {
                        source_url: program.source_url.clone(),
                        fingerprint: Some(content_hash(raw_line.as_bytes())),
                    }),
                    ..Default::default()
                }
            }
            InputRecord::Envelope(envelope) => *envelope,
            InputRecord::Error { error, raw } => Envelope {
                // The offending line is preserved verbatim; bad records
                // degrade to notes, never abort the batch.
                notes: vec![format!("input error: {}: {}", error, raw)],
                ..Default::default()
            },
        }
    }

    #[instrument(level = "debug", skip(self, course, raw_line))]
    fn compile_course(&self, course: &CourseRecord, raw_line: &str) -> Envelope {
        let mut envelope = Envelope::default();

        let code = course
            .code
            .as_deref()
            .and_then(|c| canonicalize(c, self.options.profile))
            .or_else(|| {
                course
                    .title
                    .as_deref()
                    .and_then(|t| canonicalize(t, self.options.profile))
            });
        let Some(id) = code else {
            debug!("course record without resolvable code dropped");
            envelope
                .notes
                .push("course record without resolvable code".to_string());
            return envelope;
        };

        let (subject, level) = subject_and_level(&id);
        envelope.courses.push(Node {
            id: id.clone(),
            title: course.title.as_deref().map(clean_title),
            credits: course.credits.as_ref().and_then(float_units),
            level: (level > 0).then_some(level),
            subject: (!subject.is_empty()).then_some(subject),
            description: course.description.clone(),
            source_url: course.source_url.clone(),
        });

        // Labeled free-text relation fields.
        for (hint, text) in [
            (RelationHint::Prereq, &course.prereqs),
            (RelationHint::Coreq, &course.coreqs),
            (RelationHint::Exclusion, &course.antireqs),
        ] {
            if let Some(span) = text.as_deref() {
                envelope
                    .edges
                    .extend(self.classifier.classify_span(&id, hint, span));
            }
        }

        // Structured relation entries, each carrying its own hint label.
        for relation in &course.relations {
            let hint = relation
                .kind
                .as_deref()
                .map(RelationHint::from_label)
                .unwrap_or_default();
            if let Some(span) = relation.source_span.as_deref() {
                envelope
                    .edges
                    .extend(self.classifier.classify_span(&id, hint, span));
            }
        }

        for field in &course.enrollment_constraints {
            let (constraints, edges) = self.compile_enrollment(&id, field);
            envelope.constraints.extend(constraints);
            envelope.edges.extend(edges);
        }

        envelope.provenance = Some(Provenance {
            source_url: course.source_url.clone(),
            fingerprint: Some(content_hash(raw_line.as_bytes())),
        });
        envelope
    }

    fn compile_enrollment(
        &self,
        target: &str,
        field: &EnrollmentField,
    ) -> (Vec<Constraint>, Vec<crate::domain::Edge>) {
        let mut constraints = Vec::new();
        let mut edges = Vec::new();

        // Typed payloads map directly; free-text values go through the
        // pattern extractor.
        let declared = field.constraint_type.as_deref().unwrap_or("");
        if declared.contains("term") {
            if let Some(term) = field.term.as_deref().or(field.message.as_deref()) {
                constraints.push(Constraint {
                    target: target.to_string(),
                    kind: ConstraintKind::Term,
                    expr: term.to_string(),
                });
            }
        }
        if declared.contains("consent") {
            constraints.push(Constraint {
                target: target.to_string(),
                kind: ConstraintKind::Consent,
                expr: field
                    .message
                    .clone()
                    .unwrap_or_else(|| "consent required".to_string()),
            });
        }

        for value in &field.values {
            let (c, e) = self.constraints.extract(target, value, &self.classifier);
            constraints.extend(c);
            edges.extend(e);
        }
        (constraints, edges)
    }
}

/// Run the extractor call on a helper thread, bounded by `timeout_ms`.
///
/// On timeout the helper thread is abandoned to finish in the background;
/// the collaborator is a black box with no cancellation channel.
fn call_with_timeout(
    extractor: Arc<dyn StructuredExtractor>,
    value: Value,
    timeout_ms: u64,
) -> Result<Envelope, ExtractorError> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = extractor.extract(&value);
        let _ = tx.send(result);
    });
    match rx.recv_timeout(Duration::from_millis(timeout_ms)) {
        Ok(result) => result,
        Err(_) => Err(ExtractorError::Timeout(timeout_ms)),
    }
}

/// Exclusive-writer output sink for per-record envelopes.
///
/// Writes are serialized; each envelope lands as one complete line, so
/// two records' bytes never interleave and a cancelled run leaves a
/// valid prefix.
pub struct EnvelopeSink<W: Write> {
    inner: Mutex<W>,
}

impl<W: Write> EnvelopeSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Mutex::new(writer),
        }
    }

    pub fn write_envelope(&self, envelope: &Envelope) -> CompileResult<()> {
        let mut line = serde_json::to_string(envelope)?;
        line.push('\n');
        let mut writer = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writer
            .write_all(line.as_bytes())
            .map_err(CompileError::SinkWrite)?;
        writer.flush().map_err(CompileError::SinkWrite)
    }

    pub fn into_inner(self) -> W {
        self.inner
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Strip a leading "CODE - " prefix from a scraped title, keeping the
/// original when nothing would remain.
fn clean_title(raw: &str) -> String {
    let stripped = TITLE_CODE_PREFIX.replace(raw, "").trim().to_string();
    if stripped.is_empty() {
        raw.trim().to_string()
    } else {
        stripped
    }
}
