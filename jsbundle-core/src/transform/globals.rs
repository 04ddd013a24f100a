//! Record free uses of `global`, `process` and `Buffer`

use super::{Pass, PassContext};
use crate::error::BundleError;
use crate::syntax::ast::ModuleItem;
use crate::syntax::free_names;
use tracing::trace;

pub struct GlobalDetection;

const ENV_GLOBALS: [&str; 3] = ["global", "process", "Buffer"];

impl Pass for GlobalDetection {
    fn name(&self) -> &'static str {
        "global-detection"
    }

    fn run(&self, body: &mut Vec<ModuleItem>, cx: &mut PassContext<'_>) -> Result<(), BundleError> {
        for name in free_names(body, cx.unresolved, &ENV_GLOBALS) {
            trace!(target: "jsbundle::transform", index = cx.index, global = %name, "detected");
            cx.session.detected_globals.mark(&name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::DetectedGlobals;
    use crate::transform::test_support::transform;

    #[test]
    fn test_detects_free_globals() {
        let (_, session) = transform(&[(
            "/p/main.js",
            "if (process.env.NODE_ENV) { new Buffer(1); }",
        )])
        .unwrap();
        assert_eq!(
            session.detected_globals,
            DetectedGlobals {
                global: false,
                process: true,
                buffer: true
            }
        );
    }

    #[test]
    fn test_local_bindings_are_not_globals() {
        let (_, session) = transform(&[(
            "/p/main.js",
            "var global = this; function f(process) { return process; } global.x = 1;",
        )])
        .unwrap();
        assert!(!session.detected_globals.any());
    }

    #[test]
    fn test_global_inside_template_substitution() {
        let (_, session) = transform(&[("/p/main.js", "var s = `${global.x}`;")]).unwrap();
        assert!(session.detected_globals.global);
    }
}
