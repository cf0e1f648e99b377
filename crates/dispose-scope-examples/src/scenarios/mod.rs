pub mod detach_outlives_scope;
pub mod dispose_everything_but;
pub mod nested_move_to_outer;
pub mod out_of_order_end;
pub mod training_loop;

use dispose_scope::DisposeScope;
use dispose_scope_native::TensorError;

pub(crate) fn open(name: &str) -> Result<DisposeScope, String> {
    dispose_scope::new_named_dispose_scope(name).map_err(|e| e.to_string())
}

pub(crate) fn tensor_err(e: TensorError) -> String {
    format!("tensor operation failed: {e}")
}
