pub const HELP: &str = r#"
Available commands:

r, run                      -- compile the loaded source and start debugging
u, upload <file>            -- upload a prebuilt binary and start debugging
si, stepi                   -- step one instruction
s, step                     -- step one source line
c, continue                 -- continue to the next breakpoint or completion
loop                        -- step automatically until the program finishes
b, break <line>|0x<addr>    -- toggle a breakpoint on a source line or address
in, stdin <text>            -- send a line to the program's standard input
download <file>             -- save the compiled artifact to a file
stop                        -- stop the active session
source <file>               -- load a source file into the editor
lang <c|cxx|asm>            -- select the source language
list                        -- print the disassembly listing
regs                        -- print the last register snapshot
vars                        -- print the last variable snapshot
stack                       -- print the last stack trace
h, help                     -- show this help
q, quit                     -- exit steptrace
"#;
