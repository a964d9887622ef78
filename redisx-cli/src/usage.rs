pub fn help() {
    let sections = vec![
        (
            "Session",
            vec![
                ("HELP", "Display this usage information"),
                ("CLEAR", "Clear the screen"),
                ("RECONNECT", "Disconnect and connect to the server again"),
                ("QUIT | EXIT", "End the session (or press `Esc`)"),
            ],
        ),
        (
            "Requests",
            vec![
                (
                    "<command> [arg ...]",
                    "Send any Redis command, e.g. `GET key`",
                ),
                (
                    "SET key \"some value\"",
                    "Quote arguments containing spaces",
                ),
                (
                    "SET key 'line\\nbreak'",
                    "Backslash escapes inside quotes",
                ),
            ],
        ),
        (
            "Editing",
            vec![
                ("↑ / ↓", "Browse the command history"),
                ("← / →, Home / End", "Move the cursor"),
            ],
        ),
    ];

    println!("USAGE:\r\n");

    for (section, commands) in sections {
        println!("  {section}:\r");
        for (cmd, desc) in commands {
            println!("    {:<40} # {}\r", cmd, desc);
        }
        println!("\r");
    }
}
