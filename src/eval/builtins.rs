//! Pure built-in evaluation. Every `fn::…` except `invoke` (which needs the
//! orchestrator) and the asset/archive constructors that simply wrap an
//! already-evaluated argument are a synchronous, side-effect-free function
//! over `Eventual`/`Value`, called from `eval::engine` after that module has
//! recursively evaluated the builtin's sub-expressions.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::diagnostics::{Diagnostics, SourceRange};

use super::value::{Archive, Asset, Eventual, Value};

/// If `v` is poisoned or unknown, returns the propagated `Eventual` the
/// caller should return as-is without inspecting `v.value`. `None` means
/// `v` is known and not poisoned, so `v.value` is safe to unwrap.
fn propagate(v: &Eventual) -> Option<Eventual> {
    if v.poisoned {
        return Some(Eventual { value: None, known: false, secret: v.secret, poisoned: true, deps: v.deps.clone() });
    }
    if !v.known {
        return Some(Eventual { value: None, known: false, secret: v.secret, poisoned: false, deps: v.deps.clone() });
    }
    None
}

fn poison_with(secret: bool, deps: std::collections::BTreeSet<String>) -> Eventual {
    Eventual { value: None, known: false, secret, poisoned: true, deps }
}

pub fn join(delim: &Eventual, values: &Eventual, range: &SourceRange, diags: &mut Diagnostics) -> Eventual {
    let (known, secret, poisoned, deps) = Eventual::combine(&[delim, values]);
    if poisoned {
        return Eventual { value: None, known: false, secret, poisoned: true, deps };
    }
    if !known {
        return Eventual { value: None, known: false, secret, poisoned: false, deps };
    }
    let delim_str = match delim.value.as_ref().and_then(Value::as_str) {
        Some(s) => s,
        None => {
            diags.error(Some(range.clone()), "fn::join delimiter must be a string", "");
            return poison_with(secret, deps);
        }
    };
    let list = match values.value.as_ref().and_then(Value::as_list) {
        Some(l) => l,
        None => {
            diags.error(Some(range.clone()), "fn::join values must be an array", "");
            return poison_with(secret, deps);
        }
    };
    let mut all_ok = true;
    let mut parts = Vec::with_capacity(list.len());
    for (i, item) in list.iter().enumerate() {
        match item.as_str() {
            Some(s) => parts.push(s.to_string()),
            None => {
                all_ok = false;
                diags.error(
                    Some(range.clone()),
                    format!("fn::join: element {} is not a string (found {})", i, item.type_name()),
                    "",
                );
            }
        }
    }
    if !all_ok {
        return poison_with(secret, deps);
    }
    Eventual { value: Some(Value::String(parts.join(delim_str))), known: true, secret, poisoned: false, deps }
}

pub fn split(delim: &Eventual, source: &Eventual, range: &SourceRange, diags: &mut Diagnostics) -> Eventual {
    let (known, secret, poisoned, deps) = Eventual::combine(&[delim, source]);
    if poisoned {
        return Eventual { value: None, known: false, secret, poisoned: true, deps };
    }
    if !known {
        return Eventual { value: None, known: false, secret, poisoned: false, deps };
    }
    let delim_str = match delim.value.as_ref().and_then(Value::as_str) {
        Some(s) => s,
        None => {
            diags.error(Some(range.clone()), "fn::split delimiter must be a string", "");
            return poison_with(secret, deps);
        }
    };
    let source_str = match source.value.as_ref().and_then(Value::as_str) {
        Some(s) => s,
        None => {
            diags.error(Some(range.clone()), "fn::split source must be a string", "");
            return poison_with(secret, deps);
        }
    };
    let parts: Vec<Value> = source_str.split(delim_str).map(|s| Value::String(s.to_string())).collect();
    Eventual { value: Some(Value::List(parts)), known: true, secret, poisoned: false, deps }
}

pub fn select(index: &Eventual, values: &Eventual, range: &SourceRange, diags: &mut Diagnostics) -> Eventual {
    let (known, secret, poisoned, deps) = Eventual::combine(&[index, values]);
    if poisoned {
        return Eventual { value: None, known: false, secret, poisoned: true, deps };
    }
    if !known {
        return Eventual { value: None, known: false, secret, poisoned: false, deps };
    }
    let idx = match index.value.as_ref() {
        Some(Value::Number(n)) => {
            if n.fract() != 0.0 {
                diags.error(Some(range.clone()), "fn::select index must be an integer", "");
                return poison_with(secret, deps);
            }
            *n as i64
        }
        _ => {
            diags.error(Some(range.clone()), "fn::select index must be an integer", "");
            return poison_with(secret, deps);
        }
    };
    let list = match values.value.as_ref().and_then(Value::as_list) {
        Some(l) => l,
        None => {
            diags.error(Some(range.clone()), "fn::select values must be an array", "");
            return poison_with(secret, deps);
        }
    };
    if idx < 0 || idx as usize >= list.len() {
        diags.error(Some(range.clone()), "fn::select index out of range", "");
        return poison_with(secret, deps);
    }
    Eventual { value: Some(list[idx as usize].clone()), known: true, secret, poisoned: false, deps }
}

pub fn to_json(v: &Eventual) -> Eventual {
    Eventual::map(&[v], |vals| Value::String(vals[0].to_json().to_string()))
}

pub fn to_base64(v: &Eventual, range: &SourceRange, diags: &mut Diagnostics) -> Eventual {
    if let Some(p) = propagate(v) {
        return p;
    }
    match v.value.as_ref().and_then(Value::as_str) {
        Some(s) => Eventual {
            value: Some(Value::String(BASE64.encode(s))),
            known: true,
            secret: v.secret,
            poisoned: false,
            deps: v.deps.clone(),
        },
        None => {
            diags.error(Some(range.clone()), "fn::toBase64 argument must be a string", "");
            poison_with(v.secret, v.deps.clone())
        }
    }
}

pub fn from_base64(v: &Eventual, range: &SourceRange, diags: &mut Diagnostics) -> Eventual {
    if let Some(p) = propagate(v) {
        return p;
    }
    let s = match v.value.as_ref().and_then(Value::as_str) {
        Some(s) => s,
        None => {
            diags.error(Some(range.clone()), "fn::fromBase64 argument must be a string", "");
            return poison_with(v.secret, v.deps.clone());
        }
    };
    let bytes = match BASE64.decode(s) {
        Ok(b) => b,
        Err(e) => {
            diags.error(Some(range.clone()), format!("fn::fromBase64: invalid base64: {}", e), "");
            return poison_with(v.secret, v.deps.clone());
        }
    };
    match String::from_utf8(bytes) {
        Ok(decoded) => Eventual {
            value: Some(Value::String(decoded)),
            known: true,
            secret: v.secret,
            poisoned: false,
            deps: v.deps.clone(),
        },
        Err(_) => {
            diags.error(Some(range.clone()), "fn::fromBase64: invalid UTF-8", "");
            poison_with(v.secret, v.deps.clone())
        }
    }
}

/// The result of `fn::secret` is always eventual — marking the secret flag
/// already makes `Eventual::is_eventual` report `true` regardless of
/// whether the underlying value is known.
pub fn secret(v: &Eventual) -> Eventual {
    v.clone().with_secret(true)
}

pub fn read_file(path_val: &Eventual, cwd: &Path, allow_external: bool, range: &SourceRange, diags: &mut Diagnostics) -> Eventual {
    if let Some(p) = propagate(path_val) {
        return p;
    }
    let path_str = match path_val.value.as_ref().and_then(Value::as_str) {
        Some(s) => s,
        None => {
            diags.error(Some(range.clone()), "fn::readFile argument must be a string", "");
            return poison_with(path_val.secret, path_val.deps.clone());
        }
    };
    let candidate = Path::new(path_str);
    let resolved = if candidate.is_absolute() { candidate.to_path_buf() } else { cwd.join(candidate) };

    let escapes = !resolved.starts_with(cwd);
    if escapes && !allow_external {
        diags.error(
            Some(range.clone()),
            format!("fn::readFile: path `{}` escapes the program directory", path_str),
            "",
        );
        return poison_with(path_val.secret, path_val.deps.clone());
    }

    match std::fs::read_to_string(&resolved) {
        Ok(contents) => Eventual {
            value: Some(Value::String(contents)),
            known: true,
            secret: path_val.secret,
            poisoned: false,
            deps: path_val.deps.clone(),
        },
        Err(e) => {
            diags.error(Some(range.clone()), format!("fn::readFile: {}", e), "");
            poison_with(path_val.secret, path_val.deps.clone())
        }
    }
}

pub fn string_asset(v: &Eventual, range: &SourceRange, diags: &mut Diagnostics) -> Eventual {
    if let Some(p) = propagate(v) {
        return p;
    }
    match v.value.as_ref().and_then(Value::as_str) {
        Some(s) => Eventual {
            value: Some(Value::Asset(Asset::String(s.to_string()))),
            known: true,
            secret: v.secret,
            poisoned: false,
            deps: v.deps.clone(),
        },
        None => {
            diags.error(Some(range.clone()), "fn::stringAsset argument must be a string", "");
            poison_with(v.secret, v.deps.clone())
        }
    }
}

pub fn file_asset(v: &Eventual, range: &SourceRange, diags: &mut Diagnostics) -> Eventual {
    wrap_path(v, range, diags, "fn::fileAsset", |path| Value::Asset(Asset::File(path)))
}

pub fn remote_asset(v: &Eventual, range: &SourceRange, diags: &mut Diagnostics) -> Eventual {
    wrap_path(v, range, diags, "fn::remoteAsset", |path| Value::Asset(Asset::Remote(path)))
}

pub fn file_archive(v: &Eventual, range: &SourceRange, diags: &mut Diagnostics) -> Eventual {
    wrap_path(v, range, diags, "fn::fileArchive", |path| Value::Archive(Archive::File(path)))
}

pub fn remote_archive(v: &Eventual, range: &SourceRange, diags: &mut Diagnostics) -> Eventual {
    wrap_path(v, range, diags, "fn::remoteArchive", |path| Value::Archive(Archive::Remote(path)))
}

fn wrap_path(v: &Eventual, range: &SourceRange, diags: &mut Diagnostics, who: &str, make: impl FnOnce(String) -> Value) -> Eventual {
    if let Some(p) = propagate(v) {
        return p;
    }
    match v.value.as_ref().and_then(Value::as_str) {
        Some(s) => Eventual { value: Some(make(s.to_string())), known: true, secret: v.secret, poisoned: false, deps: v.deps.clone() },
        None => {
            diags.error(Some(range.clone()), format!("{} argument must be a string", who), "");
            poison_with(v.secret, v.deps.clone())
        }
    }
}

/// `fn::assetArchive` bundles already-evaluated named entries; it has no
/// evaluation of its own beyond propagating its arguments' known/secret/
/// poison state.
pub fn asset_archive(entries: &[(String, Eventual)]) -> Eventual {
    let refs: Vec<&Eventual> = entries.iter().map(|(_, e)| e).collect();
    let (known, secret, poisoned, deps) = Eventual::combine(&refs);
    if poisoned {
        return Eventual { value: None, known: false, secret, poisoned: true, deps };
    }
    if !known {
        return Eventual { value: None, known: false, secret, poisoned: false, deps };
    }
    let values: Vec<(String, Value)> = entries
        .iter()
        .map(|(k, e)| (k.clone(), e.value.clone().expect("known implies Some")))
        .collect();
    Eventual { value: Some(Value::Archive(Archive::Assets(values))), known: true, secret, poisoned: false, deps }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn known(v: Value) -> Eventual {
        Eventual::known(v)
    }

    fn strs(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| Value::String(s.to_string())).collect())
    }

    #[test]
    fn join_concatenates_with_delimiter() {
        let mut diags = Diagnostics::new();
        let result = join(&known(Value::String(",".into())), &known(strs(&["a", "b", "c"])), &SourceRange::unknown(), &mut diags);
        assert!(!diags.has_errors());
        assert_eq!(result.value, Some(Value::String("a,b,c".into())));
    }

    #[test]
    fn join_reports_every_bad_element() {
        let mut diags = Diagnostics::new();
        let values = known(Value::List(vec![Value::Number(1.0), Value::Map(vec![])]));
        let result = join(&known(Value::String(",".into())), &values, &SourceRange::unknown(), &mut diags);
        assert!(result.poisoned);
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().any(|d| d.summary.contains("element 0") && d.summary.contains("number")));
        assert!(diags.iter().any(|d| d.summary.contains("element 1") && d.summary.contains("object")));
    }

    #[test]
    fn join_of_split_round_trips() {
        let mut diags = Diagnostics::new();
        let delim = known(Value::String(",".into()));
        let source = known(Value::String("a,b,c".into()));
        let split_result = split(&delim, &source, &SourceRange::unknown(), &mut diags);
        let joined = join(&delim, &split_result, &SourceRange::unknown(), &mut diags);
        assert_eq!(joined.value, Some(Value::String("a,b,c".into())));
    }

    #[test]
    fn split_of_empty_source_yields_single_empty_element() {
        let mut diags = Diagnostics::new();
        let result = split(&known(Value::String(",".into())), &known(Value::String(String::new())), &SourceRange::unknown(), &mut diags);
        assert_eq!(result.value, Some(Value::List(vec![Value::String(String::new())])));
    }

    #[test]
    fn select_negative_index_is_out_of_range() {
        let mut diags = Diagnostics::new();
        let result = select(&known(Value::Number(-1.0)), &known(strs(&["a", "b"])), &SourceRange::unknown(), &mut diags);
        assert!(result.poisoned);
        assert!(diags.iter().any(|d| d.summary.contains("out of range")));
    }

    #[test]
    fn select_fractional_index_must_be_integer() {
        let mut diags = Diagnostics::new();
        let result = select(&known(Value::Number(1.5)), &known(strs(&["a", "b"])), &SourceRange::unknown(), &mut diags);
        assert!(result.poisoned);
        assert!(diags.iter().any(|d| d.summary.contains("must be an integer")));
    }

    #[test]
    fn select_over_unknown_list_is_unknown() {
        let mut diags = Diagnostics::new();
        let unknown_list = Eventual::unknown(BTreeSet::new());
        let result = select(&known(Value::Number(0.0)), &unknown_list, &SourceRange::unknown(), &mut diags);
        assert!(!result.known);
        assert!(!result.poisoned);
    }

    #[test]
    fn base64_round_trips_valid_utf8() {
        let mut diags = Diagnostics::new();
        let original = known(Value::String("hello world".into()));
        let encoded = to_base64(&original, &SourceRange::unknown(), &mut diags);
        let decoded = from_base64(&encoded, &SourceRange::unknown(), &mut diags);
        assert_eq!(decoded.value, Some(Value::String("hello world".into())));
        assert!(!diags.has_errors());
    }

    #[test]
    fn from_base64_of_invalid_utf8_is_an_error() {
        let mut diags = Diagnostics::new();
        let invalid_utf8_b64 = BASE64.encode([0xc3u8, 0x28]);
        let result = from_base64(&known(Value::String(invalid_utf8_b64)), &SourceRange::unknown(), &mut diags);
        assert!(result.poisoned);
        assert!(diags.iter().any(|d| d.summary.contains("invalid UTF-8")));
    }

    #[test]
    fn secret_marks_value_eventual() {
        let v = known(Value::String("shh".into()));
        let result = secret(&v);
        assert!(result.is_eventual());
        assert!(result.secret);
        assert_eq!(result.value, Some(Value::String("shh".into())));
    }

    #[test]
    fn asset_archive_bundles_named_entries() {
        let entries = vec![
            ("a".to_string(), known(Value::Asset(Asset::String("x".into())))),
            ("b".to_string(), known(Value::Asset(Asset::String("y".into())))),
        ];
        let result = asset_archive(&entries);
        assert!(matches!(result.value, Some(Value::Archive(Archive::Assets(_)))));
    }

    #[test]
    fn read_file_under_cwd_returns_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("greeting.txt"), "hello from disk").unwrap();
        let mut diags = Diagnostics::new();
        let result = read_file(
            &known(Value::String("greeting.txt".into())),
            dir.path(),
            false,
            &SourceRange::unknown(),
            &mut diags,
        );
        assert_eq!(result.value, Some(Value::String("hello from disk".into())));
        assert!(!diags.has_errors());
    }

    #[test]
    fn read_file_escaping_cwd_is_rejected_without_allow_external() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outside = tempfile::tempdir().expect("outside tempdir");
        let outside_file = outside.path().join("secret.txt");
        std::fs::write(&outside_file, "nope").unwrap();
        let mut diags = Diagnostics::new();
        let result = read_file(
            &known(Value::String(outside_file.to_string_lossy().into_owned())),
            dir.path(),
            false,
            &SourceRange::unknown(),
            &mut diags,
        );
        assert!(result.poisoned);
        assert!(diags.iter().any(|d| d.summary.contains("escapes the program directory")));
    }

    #[test]
    fn read_file_escaping_cwd_is_allowed_when_host_policy_permits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outside = tempfile::tempdir().expect("outside tempdir");
        let outside_file = outside.path().join("allowed.txt");
        std::fs::write(&outside_file, "ok").unwrap();
        let mut diags = Diagnostics::new();
        let result = read_file(
            &known(Value::String(outside_file.to_string_lossy().into_owned())),
            dir.path(),
            true,
            &SourceRange::unknown(),
            &mut diags,
        );
        assert_eq!(result.value, Some(Value::String("ok".into())));
        assert!(!diags.has_errors());
    }
}
