//! String functions.
//!
//! Case mapping is ASCII-only. Lengths are in bytes, which is what
//! packet payloads are measured in.

use super::{bad_arg, str_arg};
use crate::types::{self, TypeRef};
use crate::values::{BuiltinFunc, Builtins, Val};
use crate::{String, vec};

fn string_to(ret: TypeRef) -> TypeRef {
    types::function(vec![(String::from("s"), types::string())], ret)
}

pub fn register_string(builtins: &mut Builtins) {
    builtins.register(
        BuiltinFunc::new("strlen", string_to(types::count()), |args| {
            Ok(Val::Count(str_arg("strlen", args, 0)?.len() as u64))
        })
        .foldable(),
    );

    builtins.register(
        BuiltinFunc::new("to_lower", string_to(types::string()), |args| {
            Ok(Val::str(&str_arg("to_lower", args, 0)?.to_ascii_lowercase()))
        })
        .foldable(),
    );

    builtins.register(
        BuiltinFunc::new("to_upper", string_to(types::string()), |args| {
            Ok(Val::str(&str_arg("to_upper", args, 0)?.to_ascii_uppercase()))
        })
        .foldable(),
    );

    builtins.register(
        BuiltinFunc::new(
            "starts_with",
            types::function(
                vec![
                    (String::from("s"), types::string()),
                    (String::from("prefix"), types::string()),
                ],
                types::bool(),
            ),
            |args| {
                let s = str_arg("starts_with", args, 0)?;
                let prefix = str_arg("starts_with", args, 1)?;
                Ok(Val::Bool(s.starts_with(prefix)))
            },
        )
        .foldable(),
    );

    // sub_bytes counts from 1; a start of 0 is treated like 1.
    builtins.register(
        BuiltinFunc::new(
            "sub_bytes",
            types::function(
                vec![
                    (String::from("s"), types::string()),
                    (String::from("start"), types::count()),
                    (String::from("n"), types::int()),
                ],
                types::string(),
            ),
            |args| {
                let s = str_arg("sub_bytes", args, 0)?.as_bytes();
                let start = match args.get(1) {
                    Some(Val::Count(c)) => (*c as usize).max(1) - 1,
                    other => return Err(bad_arg("sub_bytes", 1, "count", other)),
                };
                let n = match args.get(2) {
                    Some(Val::Int(n)) => *n,
                    other => return Err(bad_arg("sub_bytes", 2, "int", other)),
                };
                if start >= s.len() {
                    return Ok(Val::str(""));
                }
                // A negative length runs to the end.
                let end = if n < 0 { s.len() } else { s.len().min(start + n as usize) };
                Ok(Val::str(&String::from_utf8_lossy(&s[start..end])))
            },
        )
        .foldable(),
    );
}
