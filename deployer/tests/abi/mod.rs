#![allow(dead_code)]
use alloy::sol;

sol!(
    #[sol(rpc)]
    contract UUPSUpgradeableExample {
        function getValue() external view returns (uint256 value);
    }

    #[sol(rpc)]
    contract UUPSUpgradeableExampleV2 {
        function getValue() external view returns (uint256 value);
        function balances(address account) external view returns (uint256 balance);
    }

    #[sol(rpc)]
    contract MyERC1967Proxy {
        function getImplementation() external view returns (address implementation);
    }
);
