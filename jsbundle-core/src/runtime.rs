//! Runtime program wrapped around the module factories
//!
//! ```text
//! var global = this;                       // only when `global` is used
//! (function () {
//!   var __modules = [function _0(module, exports) {...}, ...];
//!   var __cache = {};
//!   function runtimeRequire(index) {...}   // memoizing loader
//!   var process = runtimeRequire(i).exports;
//!   var Buffer = runtimeRequire(j).exports.Buffer;
//!   return runtimeRequire(0).exports;
//! }());
//! ```
//!
//! The loader stores a module's record before running its factory, so a
//! cyclic `runtimeRequire` made while the factory is still running sees the
//! partially filled `exports` instead of recursing.

use crate::error::BundleError;
use crate::syntax::ast::{Decl, Expr, Function, Lit, Null, ReturnStmt, Stmt};
use crate::syntax::build::{array, assign, call, expr_stmt, fn_expr, function, ident_expr, member, member_expr, num, paren, var};
use crate::transform::{template, RUNTIME_REQUIRE};
use swc_core::common::DUMMY_SP;
use jsbundle_config::Target;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Shim sources by core module name
static SHIMS: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut shims = BTreeMap::new();
    shims.insert("process", PROCESS_SHIM);
    shims.insert("buffer", BUFFER_SHIM);
    shims
});

pub fn shim_source(name: &str) -> Option<&'static str> {
    SHIMS.get(name).copied()
}

pub fn shim_names() -> impl Iterator<Item = &'static str> {
    SHIMS.keys().copied()
}

/// Environment bindings injected at the top of the runtime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Injected {
    /// `var global = this;`
    pub global: bool,
    /// Index of the module providing `process`
    pub process: Option<usize>,
    /// Index of the module whose `Buffer` export provides `Buffer`
    pub buffer: Option<usize>,
}

const LOADER: &str = r#"var __modules = [];
var __cache = {};
function runtimeRequire(index) {
  var record = __cache[index];
  if (!record) {
    record = __cache[index] = { module: { exports: {} } };
    __modules[index].call(record.module.exports, record.module, record.module.exports);
  }
  return record.module;
}"#;

fn require_exports(index: usize) -> Expr {
    member(call(ident_expr(RUNTIME_REQUIRE), vec![num(index as f64)]), "exports")
}

/// Assemble the whole bundle program. `factories[i]` is module `i`.
pub fn build_program(
    factories: Vec<Option<Function>>,
    injected: Injected,
    target: Target,
) -> Result<Vec<Stmt>, BundleError> {
    let mut inner = template(LOADER)?;
    if let Some(Stmt::Decl(Decl::Var(decl))) = inner.first_mut() {
        if let Some(declarator) = decl.decls.first_mut() {
            let elements = factories
                .into_iter()
                .enumerate()
                .map(|(index, factory)| match factory {
                    Some(func) => fn_expr(Some(&format!("_{}", index)), func),
                    None => Expr::Lit(Lit::Null(Null { span: DUMMY_SP })),
                })
                .collect();
            declarator.init = Some(Box::new(array(elements)));
        }
    }

    if target == Target::Browser {
        if let Some(index) = injected.process {
            inner.push(var("process", require_exports(index)));
        }
        if let Some(index) = injected.buffer {
            inner.push(var("Buffer", member(require_exports(index), "Buffer")));
        }
    }
    inner.push(Stmt::Return(ReturnStmt {
        span: DUMMY_SP,
        arg: Some(Box::new(require_exports(0))),
    }));

    let iife = call(paren(fn_expr(None, function(&[], inner))), Vec::new());

    let mut program = Vec::new();
    match target {
        Target::Browser => {
            if injected.global {
                program.extend(template("var global = this;")?);
            }
            program.push(expr_stmt(iife));
        }
        Target::Node => {
            let module_exports = member_expr(ident_expr("module"), "exports");
            program.push(expr_stmt(assign(module_exports, iife)));
        }
    }
    Ok(program)
}

const PROCESS_SHIM: &str = r#"var queue = [];
var draining = false;
var schedule = typeof setTimeout === "function" ? setTimeout : function (fn) {
  fn();
};

function drainQueue() {
  if (draining) {
    return;
  }
  draining = true;
  var task;
  while (task = queue.shift()) {
    task.fn.apply(null, task.args);
  }
  draining = false;
}

function noop() {}

module.exports = {
  title: "browser",
  browser: true,
  env: {},
  argv: [],
  version: "",
  versions: {},
  platform: "browser",
  nextTick: function (fn) {
    var args = Array.prototype.slice.call(arguments, 1);
    queue.push({ fn: fn, args: args });
    if (queue.length === 1 && !draining) {
      schedule(drainQueue, 0);
    }
  },
  cwd: function () {
    return "/";
  },
  chdir: function () {
    throw new Error("process.chdir is not supported");
  },
  umask: function () {
    return 0;
  },
  binding: function () {
    throw new Error("process.binding is not supported");
  },
  on: noop,
  once: noop,
  off: noop,
  emit: noop,
  addListener: noop,
  removeListener: noop,
  removeAllListeners: noop,
  listeners: function () {
    return [];
  }
};
"#;

const BUFFER_SHIM: &str = r#"var ALPHABET = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

function Buffer(arg, encodingOrOffset, length) {
  if (typeof arg === "number") {
    return allocate(arg);
  }
  return from(arg, encodingOrOffset, length);
}

Buffer.prototype = Object.create(Uint8Array.prototype);
Buffer.prototype.constructor = Buffer;

function wrap(view) {
  Object.setPrototypeOf(view, Buffer.prototype);
  return view;
}

function allocate(size) {
  return wrap(new Uint8Array(size));
}

function normalizeEncoding(encoding) {
  var name = String(encoding || "utf8").toLowerCase();
  if (name === "utf-8") {
    return "utf8";
  }
  if (name === "binary" || name === "ascii") {
    return "latin1";
  }
  return name;
}

function utf8Bytes(str) {
  var bytes = [];
  for (var i = 0; i < str.length; i++) {
    var c = str.charCodeAt(i);
    if (c >= 0xd800 && c < 0xdc00 && i + 1 < str.length) {
      var next = str.charCodeAt(i + 1);
      if (next >= 0xdc00 && next < 0xe000) {
        c = 0x10000 + (c - 0xd800 << 10) + (next - 0xdc00);
        i++;
      }
    }
    if (c < 0x80) {
      bytes.push(c);
    } else if (c < 0x800) {
      bytes.push(0xc0 | c >> 6, 0x80 | c & 63);
    } else if (c < 0x10000) {
      bytes.push(0xe0 | c >> 12, 0x80 | c >> 6 & 63, 0x80 | c & 63);
    } else {
      bytes.push(0xf0 | c >> 18, 0x80 | c >> 12 & 63, 0x80 | c >> 6 & 63, 0x80 | c & 63);
    }
  }
  return bytes;
}

function utf8Text(buf, start, end) {
  var out = "";
  var i = start;
  while (i < end) {
    var b = buf[i];
    var c;
    var extra;
    if (b < 0x80) {
      c = b;
      extra = 0;
    } else if (b >= 0xf0) {
      c = b & 7;
      extra = 3;
    } else if (b >= 0xe0) {
      c = b & 15;
      extra = 2;
    } else if (b >= 0xc0) {
      c = b & 31;
      extra = 1;
    } else {
      c = 0xfffd;
      extra = 0;
    }
    i++;
    while (extra > 0 && i < end) {
      c = c << 6 | buf[i] & 63;
      i++;
      extra--;
    }
    if (c >= 0x10000) {
      c -= 0x10000;
      out += String.fromCharCode(0xd800 + (c >> 10), 0xdc00 + (c & 1023));
    } else {
      out += String.fromCharCode(c);
    }
  }
  return out;
}

function hexBytes(str) {
  var bytes = [];
  for (var i = 0; i + 1 < str.length; i += 2) {
    var value = parseInt(str.substr(i, 2), 16);
    if (isNaN(value)) {
      break;
    }
    bytes.push(value);
  }
  return bytes;
}

function hexText(buf, start, end) {
  var out = "";
  for (var i = start; i < end; i++) {
    out += (buf[i] < 16 ? "0" : "") + buf[i].toString(16);
  }
  return out;
}

function latin1Bytes(str) {
  var bytes = [];
  for (var i = 0; i < str.length; i++) {
    bytes.push(str.charCodeAt(i) & 255);
  }
  return bytes;
}

function latin1Text(buf, start, end) {
  var out = "";
  for (var i = start; i < end; i++) {
    out += String.fromCharCode(buf[i]);
  }
  return out;
}

function base64Bytes(str) {
  var clean = str.replace(/[^A-Za-z0-9+\/]/g, "");
  var bytes = [];
  var bits = 0;
  var value = 0;
  for (var i = 0; i < clean.length; i++) {
    value = value << 6 | ALPHABET.indexOf(clean.charAt(i));
    bits += 6;
    if (bits >= 8) {
      bits -= 8;
      bytes.push(value >> bits & 255);
    }
  }
  return bytes;
}

function base64Text(buf, start, end) {
  var out = "";
  for (var i = start; i < end; i += 3) {
    var a = buf[i];
    var b = i + 1 < end ? buf[i + 1] : 0;
    var c = i + 2 < end ? buf[i + 2] : 0;
    var triple = a << 16 | b << 8 | c;
    out += ALPHABET.charAt(triple >> 18 & 63) + ALPHABET.charAt(triple >> 12 & 63);
    out += i + 1 < end ? ALPHABET.charAt(triple >> 6 & 63) : "=";
    out += i + 2 < end ? ALPHABET.charAt(triple & 63) : "=";
  }
  return out;
}

function stringBytes(str, encoding) {
  switch (normalizeEncoding(encoding)) {
    case "hex":
      return hexBytes(str);
    case "base64":
      return base64Bytes(str);
    case "latin1":
      return latin1Bytes(str);
    default:
      return utf8Bytes(str);
  }
}

function from(value, encodingOrOffset, length) {
  if (typeof value === "string") {
    return wrap(new Uint8Array(stringBytes(value, encodingOrOffset)));
  }
  if (value instanceof ArrayBuffer) {
    var offset = encodingOrOffset || 0;
    var size = length === undefined ? value.byteLength - offset : length;
    return wrap(new Uint8Array(value, offset, size));
  }
  if (value && typeof value.length === "number") {
    var buf = allocate(value.length);
    for (var i = 0; i < value.length; i++) {
      buf[i] = value[i] & 255;
    }
    return buf;
  }
  if (value && value.type === "Buffer" && value.data) {
    return from(value.data);
  }
  throw new TypeError("The first argument must be a string, Buffer, ArrayBuffer or array-like object");
}

Buffer.from = from;

Buffer.alloc = function (size, fill) {
  var buf = allocate(size);
  if (fill !== undefined) {
    var bytes = typeof fill === "string" ? stringBytes(fill) : [fill & 255];
    for (var i = 0; i < size && bytes.length > 0; i++) {
      buf[i] = bytes[i % bytes.length];
    }
  }
  return buf;
};

Buffer.allocUnsafe = allocate;

Buffer.isBuffer = function (obj) {
  return obj instanceof Buffer;
};

Buffer.isEncoding = function (encoding) {
  var name = normalizeEncoding(encoding);
  return name === "utf8" || name === "hex" || name === "base64" || name === "latin1";
};

Buffer.byteLength = function (value, encoding) {
  if (typeof value === "string") {
    return stringBytes(value, encoding).length;
  }
  return value.byteLength;
};

Buffer.concat = function (list, totalLength) {
  var total = totalLength;
  if (total === undefined) {
    total = 0;
    for (var i = 0; i < list.length; i++) {
      total += list[i].length;
    }
  }
  var out = allocate(total);
  var pos = 0;
  for (var j = 0; j < list.length && pos < total; j++) {
    var item = list[j];
    for (var k = 0; k < item.length && pos < total; k++) {
      out[pos++] = item[k];
    }
  }
  return out;
};

Buffer.prototype.toString = function (encoding, start, end) {
  var from = start === undefined ? 0 : Math.max(0, start);
  var to = end === undefined ? this.length : Math.min(this.length, end);
  switch (normalizeEncoding(encoding)) {
    case "hex":
      return hexText(this, from, to);
    case "base64":
      return base64Text(this, from, to);
    case "latin1":
      return latin1Text(this, from, to);
    default:
      return utf8Text(this, from, to);
  }
};

Buffer.prototype.toJSON = function () {
  return { type: "Buffer", data: Array.prototype.slice.call(this) };
};

Buffer.prototype.equals = function (other) {
  if (this.length !== other.length) {
    return false;
  }
  for (var i = 0; i < this.length; i++) {
    if (this[i] !== other[i]) {
      return false;
    }
  }
  return true;
};

Buffer.prototype.slice = function (start, end) {
  var from = start === undefined ? 0 : start < 0 ? Math.max(0, this.length + start) : Math.min(start, this.length);
  var to = end === undefined ? this.length : end < 0 ? Math.max(0, this.length + end) : Math.min(end, this.length);
  return wrap(new Uint8Array(this.buffer, this.byteOffset + from, Math.max(0, to - from)));
};

module.exports = {
  Buffer: Buffer,
  kMaxLength: 0x7fffffff
};
"#;
