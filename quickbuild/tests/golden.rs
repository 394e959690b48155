use pretty_assertions::assert_eq;
use quickbuild::{Compiler, Options, compile_str};

fn render(name: &str, src: &str) -> String {
    let output = compile_str(name, src, Options::default()).expect("compile ok");
    output.commands.join("\n")
}

#[test]
fn red_blue_golden() {
    let actual = render("red_blue.qb", include_str!("fixtures/red_blue.qb"));
    let expected = include_str!("fixtures/red_blue.mush");
    assert_eq!(actual.trim(), expected.trim());
}

#[test]
fn red_blue_graph_shape() {
    let output = compile_str("red_blue.qb", include_str!("fixtures/red_blue.qb"), Options::default()).unwrap();
    let graph = &output.graph;
    assert_eq!(graph.room_count(), 2);
    assert_eq!(graph.exit_count(), 2);
    let red = graph.room_by_token("\"Red Room\"").expect("red room");
    let higher = graph.exit(red.lookup_exit("\"Higher\"").expect("higher exit"));
    assert_eq!(graph.room(higher.to).name, "Blue Room");
    assert!(output.diagnostics.is_empty());

    // every slot is written before anything looks it up
    let commands = &output.commands;
    for room in ["ROOM.Red_Room", "ROOM.Blue_Room"] {
        let set = commands.iter().position(|c| *c == format!("@set me={room}:%l")).unwrap();
        let first_use = commands.iter().position(|c| c.contains(&format!("[v({room})]"))).unwrap();
        assert!(set < first_use, "{room} used before it was stored");
    }
}

#[test]
fn tower_golden() {
    let output = compile_str("tower.qb", include_str!("fixtures/tower.qb"), Options::default()).expect("compile ok");
    let expected = include_str!("fixtures/tower.mush");
    assert_eq!(output.commands.join("\n").trim(), expected.trim());
    let warnings: Vec<String> = output.diagnostics.iter().map(ToString::to_string).collect();
    assert_eq!(warnings, vec!["WARNING: Creating room with no exits: Street"]);
}

#[test]
fn config_source_shares_state_with_main_input() {
    let mut compiler = Compiler::new(Options::default()).unwrap();
    compiler.add_source("qb.cfg", "ROOM PARENT: #10\nIN \"Lobby\"\n");
    compiler.add_source("main.qb", "@emit hello\nENDIN\n\"Out\" : \"Lobby\" -> \"Lobby\"\n");
    let output = compiler.finish().unwrap();
    let lobby = output.graph.room_by_token("\"Lobby\"").unwrap();
    // created by the IN block before the parent could apply
    assert_eq!(lobby.parent, None);
    assert_eq!(lobby.buffer(), "@emit hello");
    let warning = output.diagnostics[0].to_string();
    assert_eq!(warning, "WARNING: File 'main.qb' Line 1: Room \"Lobby\" doesn't exist");
}

#[test]
fn noreverse_changes_reverse_lookup() {
    let src = "REVERSE \"North\" \"South\"\n\"South\" : \"A\" <-> \"B\"\n";
    let two_way = render("rev.qb", src);
    assert!(two_way.contains("@open North=[v(ROOM.A)]"));

    let one_way = Options {
        bidirectional_reverse: false,
        ..Options::default()
    };
    let err = compile_str("rev.qb", src, one_way).unwrap_err();
    assert_eq!(err.to_string(), "File 'rev.qb' Line 2: No reverse exit for \"South\"");
}
