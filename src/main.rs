fn main() {
    std::process::exit(fleetgate::run());
}
