//! Create two threads that each count to five, join both, and print their
//! results.

fn print_n_times(n: i32) -> i32 {
    for _ in 0..5 {
        println!("{n}");
    }
    n
}

fn main() {
    uthreads::init(uthreads::SchedPolicy::Fifo, uthreads::config::DEFAULT_STACK_SIZE)
        .expect("default policy is always implemented");

    let thread1 = uthreads::create(|| print_n_times(1), 0).expect("create thread1");
    println!("Created thread1.");

    let thread2 = uthreads::create(|| print_n_times(2), 0).expect("create thread2");
    println!("Created thread2.");

    uthreads::join(thread1).expect("join thread1");
    uthreads::join(thread2).expect("join thread2");

    println!("Successfully joined both threads.");
}
