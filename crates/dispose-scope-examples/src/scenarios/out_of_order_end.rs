use dispose_scope_native::Tensor;

use super::open;

pub fn run() -> Result<(), String> {
    let outer = open("outer")?;
    let middle = open("middle")?;
    let inner = open("inner")?;
    let _a = Tensor::ones(&[1]);

    // Ending `middle` first is tolerated; with the default config it logs a warning.
    let middle_id = middle.id();
    middle.end();
    println!("ended {middle_id} while {} was still open", inner.id());

    let moved = inner.move_to_outer(Tensor::ones(&[1]));
    println!("{} skipped the ended scope and landed in {}", moved.id(), outer.id());
    drop(inner);
    println!("{} owns {} tensor", outer.id(), outer.disposables_count());
    Ok(())
}
